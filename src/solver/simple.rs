use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::boundary::bc2d::{apply_velocity_boundaries, net_inflow};
use crate::domain::grid2d::{CellSize2D, Grid2D};
use crate::error::SolverError;
use crate::linear::LinearSolver;
use crate::numerical::{mass_imbalance, max_abs, max_abs_difference};
use crate::solver::config::SimpleConfig;
use crate::solver::momentum::{predict, MomentumPrediction};
use crate::solver::pressure::{correct_velocities, solve_pressure_correction};

/// Net boundary inflow a closed domain may carry before it is rejected.
const CLOSED_DOMAIN_INFLOW_EPS: f64 = 1e-12;

/// Residual above which the outer iteration is considered to have blown up.
const DIVERGENCE_THRESHOLD: f64 = 1e10;

/// Convergence measures of one outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Residuals {
    /// Largest cell mass imbalance of the predicted velocities.
    pub mass: f64,
    /// Sum of absolute cell mass imbalances of the predicted velocities.
    pub mass_sum: f64,
    /// Largest change of any velocity component over the iteration.
    pub velocity_change: f64,
}

impl Residuals {
    /// Larger of the two convergence measures, NaN if either is NaN.
    pub fn max(&self) -> f64 {
        if self.mass.is_nan() || self.velocity_change.is_nan() {
            f64::NAN
        } else {
            self.mass.max(self.velocity_change)
        }
    }

    /// Non-finite, or beyond any value a converging run passes through.
    pub fn diverged(&self) -> bool {
        !(self.max() <= DIVERGENCE_THRESHOLD)
    }
}

/// Stages of one SIMPLE iteration. Each stage owns what the next one needs.
#[derive(Debug, Clone)]
pub enum SimpleState {
    Predicting,
    CorrectingPressure(MomentumPrediction),
    UpdatingFields(MomentumPrediction, DMatrix<f64>),
    CheckingConvergence(Residuals),
    Converged(Residuals),
    Diverged(Residuals),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonConvergenceReason {
    IterationLimit,
    Stopped,
    Diverged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Converged,
    NonConvergence(NonConvergenceReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub iterations: usize,
    pub residuals: Option<Residuals>,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

pub struct SimpleSolver {
    grid: Grid2D,
    config: SimpleConfig,
    linear_solver: Box<dyn LinearSolver>,
    state: SimpleState,
    iterations: usize,
    history: Vec<Residuals>,
    stop: Option<Arc<AtomicBool>>,
}

impl SimpleSolver {
    pub fn new(grid: Grid2D, config: SimpleConfig) -> Result<Self, SolverError> {
        config.validate()?;

        let fluid = grid.fluid();
        if !(fluid.rho > 0.0 && fluid.rho.is_finite()) {
            return Err(SolverError::InvalidParameter(format!(
                "Density must be positive, got {}",
                fluid.rho
            )));
        }
        if !(fluid.mu > 0.0 && fluid.mu.is_finite()) {
            return Err(SolverError::InvalidParameter(format!(
                "Viscosity must be positive, got {}",
                fluid.mu
            )));
        }

        let bcs = grid.boundaries();
        bcs.validate()?;
        if !bcs.has_outlet() {
            let inflow = net_inflow(bcs, grid.u(), grid.v(), grid.cell_size());
            if inflow.abs() > CLOSED_DOMAIN_INFLOW_EPS {
                return Err(SolverError::BoundaryConditionError(format!(
                    "Domain has no outlet but a net boundary inflow of {:.3e}",
                    inflow
                )));
            }
        }

        Ok(Self {
            linear_solver: config.linear_solver.build(),
            grid,
            config,
            state: SimpleState::Predicting,
            iterations: 0,
            history: Vec::new(),
            stop: None,
        })
    }

    /// Replaces the linear solver chosen by the configuration.
    pub fn with_linear_solver(mut self, solver: Box<dyn LinearSolver>) -> Self {
        self.linear_solver = solver;
        self
    }

    /// Flag polled between iterations; setting it ends `run` early.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn grid(&self) -> &Grid2D {
        &self.grid
    }

    pub fn into_grid(self) -> Grid2D {
        self.grid
    }

    pub fn config(&self) -> &SimpleConfig {
        &self.config
    }

    pub fn state(&self) -> &SimpleState {
        &self.state
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn history(&self) -> &[Residuals] {
        &self.history
    }

    /// Advances the state machine by one stage.
    ///
    /// A linear-solver failure leaves the grid at the previous iterate and
    /// the machine back at `Predicting`.
    pub fn step(&mut self) -> Result<&SimpleState, SolverError> {
        let state = std::mem::replace(&mut self.state, SimpleState::Predicting);
        self.state = match state {
            SimpleState::Predicting => {
                debug!(iteration = self.iterations + 1, "Predicting momentum");
                let prediction = predict(&self.grid, &self.config);
                let finite = prediction.u.iter().chain(prediction.v.iter()).all(|x| x.is_finite());
                if finite {
                    SimpleState::CorrectingPressure(prediction)
                } else {
                    let residuals = self.prediction_residuals(&prediction);
                    warn!(iteration = self.iterations + 1, "Momentum prediction is not finite");
                    SimpleState::Diverged(residuals)
                }
            }
            SimpleState::CorrectingPressure(prediction) => {
                match solve_pressure_correction(
                    &prediction,
                    self.grid.cell_size(),
                    self.linear_solver.as_ref(),
                ) {
                    Ok(p_prime) => SimpleState::UpdatingFields(prediction, p_prime),
                    Err(e) => {
                        warn!(iteration = self.iterations + 1, error = %e, "Pressure correction failed");
                        return Err(e.into());
                    }
                }
            }
            SimpleState::UpdatingFields(prediction, p_prime) => {
                SimpleState::CheckingConvergence(self.update_fields(&prediction, &p_prime)?)
            }
            SimpleState::CheckingConvergence(residuals) => {
                self.history.push(residuals);
                if self.config.log_interval > 0 && self.iterations % self.config.log_interval == 0 {
                    info!(
                        "Iteration {}: mass={:.3e}, mass_sum={:.3e}, du={:.3e}",
                        self.iterations, residuals.mass, residuals.mass_sum, residuals.velocity_change
                    );
                }
                if residuals.diverged() {
                    warn!(
                        iteration = self.iterations,
                        residual = residuals.max(),
                        "Outer iteration diverged"
                    );
                    SimpleState::Diverged(residuals)
                } else if residuals.max() < self.config.tolerance {
                    SimpleState::Converged(residuals)
                } else {
                    SimpleState::Predicting
                }
            }
            SimpleState::Converged(residuals) => SimpleState::Converged(residuals),
            SimpleState::Diverged(residuals) => SimpleState::Diverged(residuals),
        };
        Ok(&self.state)
    }

    fn prediction_residuals(&self, prediction: &MomentumPrediction) -> Residuals {
        let CellSize2D(hx, hy) = self.grid.cell_size();
        let b = mass_imbalance(&prediction.u, &prediction.v, hx, hy);
        let velocity_change = max_abs_difference(&prediction.u, self.grid.u())
            .max(max_abs_difference(&prediction.v, self.grid.v()));
        Residuals { mass: max_abs(&b), mass_sum: b.abs().sum(), velocity_change }
    }

    fn update_fields(
        &mut self,
        prediction: &MomentumPrediction,
        p_prime: &DMatrix<f64>,
    ) -> Result<Residuals, SolverError> {
        let cell_size = self.grid.cell_size();
        let CellSize2D(hx, hy) = cell_size;
        let b = mass_imbalance(&prediction.u, &prediction.v, hx, hy);

        let (mut u, mut v) = correct_velocities(prediction, p_prime);
        apply_velocity_boundaries(self.grid.boundaries(), &mut u, &mut v, cell_size);
        let p = self.grid.p() + p_prime * self.config.pressure_relaxation();

        let velocity_change =
            max_abs_difference(&u, self.grid.u()).max(max_abs_difference(&v, self.grid.v()));
        self.grid.replace_fields(u, v, p)?;
        self.iterations += 1;

        Ok(Residuals { mass: max_abs(&b), mass_sum: b.abs().sum(), velocity_change })
    }

    /// One complete outer iteration, from prediction to convergence check.
    /// Returns the residuals of that iteration, or those the machine stopped
    /// with if it had already converged or diverged.
    pub fn iterate(&mut self) -> Result<Residuals, SolverError> {
        loop {
            match self.step()? {
                SimpleState::CheckingConvergence(residuals) => {
                    let residuals = *residuals;
                    self.step()?;
                    return Ok(residuals);
                }
                SimpleState::Converged(residuals) | SimpleState::Diverged(residuals) => {
                    return Ok(*residuals)
                }
                _ => {}
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn report(&self, status: SolveStatus) -> SolveReport {
        SolveReport { status, iterations: self.iterations, residuals: self.history.last().copied() }
    }

    fn report_with(&self, status: SolveStatus, residuals: Residuals) -> SolveReport {
        SolveReport { status, iterations: self.iterations, residuals: Some(residuals) }
    }

    /// Iterates until convergence, the iteration limit or a stop request.
    pub fn run(&mut self) -> Result<SolveReport, SolverError> {
        let (nx, ny) = self.grid.shape().nodes();
        let _run_span = info_span!("simple_run", nx, ny).entered();
        info!(
            "Starting SIMPLE on {}x{} nodes (alpha={}, alpha_p={}, tol={:.1e}, max_iter={})",
            nx,
            ny,
            self.config.alpha,
            self.config.pressure_relaxation(),
            self.config.tolerance,
            self.config.max_iterations
        );
        let start = Instant::now();

        loop {
            match &self.state {
                SimpleState::Converged(residuals) => {
                    info!(
                        "Converged after {} iterations (mass={:.3e}, du={:.3e}) in {:.2}s",
                        self.iterations,
                        residuals.mass,
                        residuals.velocity_change,
                        start.elapsed().as_secs_f64()
                    );
                    return Ok(self.report(SolveStatus::Converged));
                }
                SimpleState::Diverged(residuals) => {
                    warn!(
                        iterations = self.iterations,
                        "SIMPLE diverged after {:.2}s",
                        start.elapsed().as_secs_f64()
                    );
                    return Ok(self.report_with(
                        SolveStatus::NonConvergence(NonConvergenceReason::Diverged),
                        *residuals,
                    ));
                }
                SimpleState::Predicting => {
                    if self.stop_requested() {
                        warn!(iterations = self.iterations, "Stop requested, leaving SIMPLE loop");
                        return Ok(self.report(SolveStatus::NonConvergence(
                            NonConvergenceReason::Stopped,
                        )));
                    }
                    if self.iterations >= self.config.max_iterations {
                        warn!(
                            iterations = self.iterations,
                            residual = ?self.history.last().map(Residuals::max),
                            "Iteration limit reached without convergence"
                        );
                        return Ok(self.report(SolveStatus::NonConvergence(
                            NonConvergenceReason::IterationLimit,
                        )));
                    }
                }
                _ => {}
            }
            self.step()?;
        }
    }
}
