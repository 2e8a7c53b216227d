use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::boundary::bc2d::Boundaries2D;
use crate::domain::grid2d::{Domain2D, Fluid, Grid2D, GridDimensions2D};
use crate::error::SolverError;
use crate::linear::LinearSolverKind;

/// Parameters of the outer SIMPLE iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleConfig {
    /// Velocity under-relaxation, in (0, 1].
    pub alpha: f64,
    /// Pressure under-relaxation; `None` means `1 - alpha`.
    pub alpha_p: Option<f64>,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Gauss–Seidel passes of the momentum predictor per outer iteration.
    pub momentum_sweeps: usize,
    pub log_interval: usize,
    pub linear_solver: LinearSolverKind,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            alpha: 0.8,
            alpha_p: None,
            tolerance: 1e-6,
            max_iterations: 1000,
            momentum_sweeps: 3,
            log_interval: 50,
            linear_solver: LinearSolverKind::SparseLu,
        }
    }
}

impl SimpleConfig {
    pub fn pressure_relaxation(&self) -> f64 {
        self.alpha_p.unwrap_or(1.0 - self.alpha)
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(SolverError::InvalidParameter(format!(
                "Velocity relaxation alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        let alpha_p = self.pressure_relaxation();
        if !(alpha_p > 0.0 && alpha_p <= 1.0) {
            return Err(SolverError::InvalidParameter(format!(
                "Pressure relaxation alpha_p must be in (0, 1], got {} (set alpha_p explicitly when alpha = 1)",
                alpha_p
            )));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(SolverError::InvalidParameter(format!(
                "Tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        if self.momentum_sweeps == 0 {
            return Err(SolverError::InvalidParameter(
                "momentum_sweeps must be positive".to_string(),
            ));
        }
        if let LinearSolverKind::GaussSeidel { max_iterations, tolerance } = self.linear_solver {
            if max_iterations == 0 || !(tolerance > 0.0) {
                return Err(SolverError::InvalidParameter(format!(
                    "Gauss-Seidel needs a positive budget and tolerance, got {} / {}",
                    max_iterations, tolerance
                )));
            }
        }
        Ok(())
    }
}

/// A complete run description, loadable from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub dimensions: GridDimensions2D,
    pub domain: Domain2D,
    pub fluid: Fluid,
    pub boundaries: Boundaries2D,
    pub solver: SimpleConfig,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            dimensions: GridDimensions2D(20, 20),
            domain: Domain2D::default(),
            fluid: Fluid { rho: 1.0, mu: 0.05 },
            boundaries: Boundaries2D::channel(1.0),
            solver: SimpleConfig::default(),
        }
    }
}

impl CaseConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, SolverError> {
        let file = File::open(path)
            .map_err(|e| SolverError::IoError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SolverError::IoError(format!("{}: {}", path.display(), e)))
    }

    pub fn build_grid(&self) -> Result<Grid2D, SolverError> {
        self.boundaries.validate()?;
        let grid = Grid2D::new(self.dimensions, self.domain)?
            .with_fluid(self.fluid)
            .with_boundaries(self.boundaries);
        Ok(grid)
    }
}
