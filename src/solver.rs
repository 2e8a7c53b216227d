pub mod config;
pub mod momentum;
pub mod pressure;
pub mod simple;

pub use config::{CaseConfig, SimpleConfig};
pub use simple::{NonConvergenceReason, Residuals, SimpleSolver, SimpleState, SolveReport, SolveStatus};
