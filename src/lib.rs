pub mod boundary;
pub mod domain;
pub mod error;
pub mod io;
pub mod linear;
pub mod numerical;
pub mod solver;
