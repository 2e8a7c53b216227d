//! Momentum predictor: relaxes the steady momentum equations towards a
//! velocity field consistent with the current pressure.

use nalgebra::DMatrix;
use tracing::debug;

use crate::boundary::bc2d::apply_velocity_boundaries;
use crate::domain::grid2d::{u_stencil, v_stencil, CellSize2D, Grid2D};
use crate::numerical::stencil::{advection_x, advection_y, diffusion_x, diffusion_y};
use crate::solver::config::SimpleConfig;

/// Result of the momentum sweeps with the central coefficient of every
/// interior face (0 on boundary faces).
#[derive(Debug, Clone)]
pub struct MomentumSolution {
    pub u: DMatrix<f64>,
    pub v: DMatrix<f64>,
    pub a_u: DMatrix<f64>,
    pub a_v: DMatrix<f64>,
}

/// Relaxed velocities `u*`, `v*` with the coefficients linking a face
/// velocity to the pressure-correction difference across it.
#[derive(Debug, Clone)]
pub struct MomentumPrediction {
    pub u: DMatrix<f64>,
    pub v: DMatrix<f64>,
    pub d_u: DMatrix<f64>,
    pub d_v: DMatrix<f64>,
}

/// Point Gauss–Seidel on `0 = -∇p/rho - A + nu D` for every interior face,
/// under-relaxed towards the current iterate at every point:
/// `φ ← alpha (φ + R/aP) + (1 - alpha) φ_old`.
///
/// This is the implicit form `(aP/alpha) φ = ... + (1 - alpha)/alpha aP φ_old`,
/// so the relaxed velocity responds to pressure as `d = alpha/(rho h aP)`
/// however many sweeps are made. With `alpha = 1` it is the plain solve.
///
/// u-faces are swept first against the previous `v`, then v-faces against
/// the previous `u`; both in lexicographic order (j outer, i inner). The
/// returned arrays have the boundary conditions imposed. The grid is not
/// modified.
pub fn solve_momentum(grid: &Grid2D, sweeps: usize, alpha: f64) -> MomentumSolution {
    let CellSize2D(hx, hy) = grid.cell_size();
    let fluid = grid.fluid();
    let nu = fluid.kinematic_viscosity();
    let rho = fluid.rho;
    let bcs = grid.boundaries();
    let (u_old, v_old, p) = (grid.u(), grid.v(), grid.p());
    let (nx, ny) = grid.shape().nodes();

    let mut u = u_old.clone();
    let mut a_u = DMatrix::<f64>::zeros(u.nrows(), u.ncols());
    for _ in 0..sweeps {
        for j in 0..ny - 1 {
            for i in 1..nx - 1 {
                let s = u_stencil(&u, v_old, bcs, i, j);
                let f = s.fluxes();

                let mut cy = 2.0;
                if j == 0 {
                    cy -= bcs.south.reflection();
                }
                if j == ny - 2 {
                    cy -= bcs.north.reflection();
                }
                let a_p = nu * (2.0 / (hx * hx) + cy / (hy * hy))
                    + (f.east.abs() + f.west.abs()) / (2.0 * hx)
                    + (f.north.abs() + f.south.abs()) / (2.0 * hy);

                let dp = (p[(i, j)] - p[(i - 1, j)]) / (rho * hx);
                let residual =
                    -advection_x(&s.u, &s.v, hx, hy) + nu * diffusion_x(&s.u, hx, hy) - dp;
                u[(i, j)] = alpha * (u[(i, j)] + residual / a_p) + (1.0 - alpha) * u_old[(i, j)];
                a_u[(i, j)] = a_p;
            }
        }
    }

    let mut v = v_old.clone();
    let mut a_v = DMatrix::<f64>::zeros(v.nrows(), v.ncols());
    for _ in 0..sweeps {
        for j in 1..ny - 1 {
            for i in 0..nx - 1 {
                let s = v_stencil(u_old, &v, bcs, i, j);
                let f = s.fluxes();

                let mut cx = 2.0;
                if i == 0 {
                    cx -= bcs.west.reflection();
                }
                if i == nx - 2 {
                    cx -= bcs.east.reflection();
                }
                let a_p = nu * (cx / (hx * hx) + 2.0 / (hy * hy))
                    + (f.east.abs() + f.west.abs()) / (2.0 * hx)
                    + (f.north.abs() + f.south.abs()) / (2.0 * hy);

                let dp = (p[(i, j)] - p[(i, j - 1)]) / (rho * hy);
                let residual =
                    -advection_y(&s.v, &s.u, hx, hy) + nu * diffusion_y(&s.v, hx, hy) - dp;
                v[(i, j)] = alpha * (v[(i, j)] + residual / a_p) + (1.0 - alpha) * v_old[(i, j)];
                a_v[(i, j)] = a_p;
            }
        }
    }

    apply_velocity_boundaries(bcs, &mut u, &mut v, grid.cell_size());
    MomentumSolution { u, v, a_u, a_v }
}

/// Runs the relaxed momentum sweeps and derives the velocity-correction
/// coefficients from the final central coefficients.
pub fn predict(grid: &Grid2D, config: &SimpleConfig) -> MomentumPrediction {
    let alpha = config.alpha;
    let CellSize2D(hx, hy) = grid.cell_size();
    let rho = grid.fluid().rho;

    let MomentumSolution { u, v, a_u, a_v } = solve_momentum(grid, config.momentum_sweeps, alpha);

    let d_u = a_u.map(|a| if a > 0.0 { alpha / (rho * hx * a) } else { 0.0 });
    let d_v = a_v.map(|a| if a > 0.0 { alpha / (rho * hy * a) } else { 0.0 });

    debug!(
        max_u = u.amax(),
        max_v = v.amax(),
        "Momentum prediction done"
    );
    MomentumPrediction { u, v, d_u, d_v }
}
