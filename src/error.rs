use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid grid dimension: {0}")]
    InvalidDimension(String),

    #[error("Shape mismatch for {field}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        field: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundaryError {
    #[error("Invalid boundary condition for {0}")]
    InvalidBoundaryCondition(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinearSolverError {
    #[error("Singular system: {0}")]
    SingularSystem(String),

    #[error("Linear solver diverged after {iterations} iterations (residual {residual:.3e})")]
    SolverDivergence { iterations: usize, residual: f64 },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Boundary condition error: {0}")]
    BoundaryConditionError(String),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error("Pressure correction failed: {0}")]
    LinearSolver(#[from] LinearSolverError),

    #[error("I/O error: {0}")]
    IoError(String),
}
