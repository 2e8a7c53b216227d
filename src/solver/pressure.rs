//! Pressure-correction equation and the velocity correction it drives.

use nalgebra::DMatrix;
use tracing::debug;

use crate::domain::grid2d::CellSize2D;
use crate::error::LinearSolverError;
use crate::linear::{LinearSolver, SparseSystem};
use crate::numerical::mass_imbalance;
use crate::solver::momentum::MomentumPrediction;

/// Assembles `Σ a_nb (p'_P - p'_nb) = -b` over all cells.
///
/// Cells are numbered column-major, `k = I + J (nx-1)`. Boundary faces carry
/// `d = 0` so they drop out of the stencil. Cell 0 is pinned to `p' = 0`.
pub fn assemble_pressure_correction(
    prediction: &MomentumPrediction,
    cell_size: CellSize2D,
) -> (SparseSystem, Vec<f64>) {
    let CellSize2D(hx, hy) = cell_size;
    let MomentumPrediction { u, v, d_u, d_v } = prediction;
    let b = mass_imbalance(u, v, hx, hy);
    let (ncx, ncy) = b.shape();

    let mut system = SparseSystem::new(ncx * ncy);
    let mut rhs = vec![0.0; ncx * ncy];
    for jc in 0..ncy {
        for ic in 0..ncx {
            let k = ic + jc * ncx;
            if k == 0 {
                system.add(0, 0, 1.0);
                continue;
            }

            let neighbours = [
                (d_u[(ic + 1, jc)] * hy, (ic + 1 < ncx).then(|| k + 1)),
                (d_u[(ic, jc)] * hy, (ic > 0).then(|| k - 1)),
                (d_v[(ic, jc + 1)] * hx, (jc + 1 < ncy).then(|| k + ncx)),
                (d_v[(ic, jc)] * hx, (jc > 0).then(|| k - ncx)),
            ];
            let mut diagonal = 0.0;
            for (a, neighbour) in neighbours {
                if let Some(nb) = neighbour {
                    if a != 0.0 {
                        diagonal += a;
                        system.add(k, nb, -a);
                    }
                }
            }
            system.add(k, k, diagonal);
            rhs[k] = -b[(ic, jc)];
        }
    }
    (system, rhs)
}

/// Solves for the pressure correction `p'`, shaped like `p`.
pub fn solve_pressure_correction(
    prediction: &MomentumPrediction,
    cell_size: CellSize2D,
    solver: &dyn LinearSolver,
) -> Result<DMatrix<f64>, LinearSolverError> {
    let (ncx, ncy) = (prediction.u.nrows() - 1, prediction.u.ncols());
    let (system, rhs) = assemble_pressure_correction(prediction, cell_size);
    let solution = solver.solve(&system, &rhs)?;
    let p_prime = DMatrix::from_vec(ncx, ncy, solution);
    debug!(max_p_prime = p_prime.amax(), "Pressure correction solved");
    Ok(p_prime)
}

/// `u = u* - d_u (p'_E - p'_W)`, `v = v* - d_v (p'_N - p'_S)` on interior faces.
pub fn correct_velocities(
    prediction: &MomentumPrediction,
    p_prime: &DMatrix<f64>,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let MomentumPrediction { u, v, d_u, d_v } = prediction;
    let (ncx, ncy) = p_prime.shape();

    let mut u = u.clone();
    for j in 0..ncy {
        for i in 1..ncx {
            u[(i, j)] -= d_u[(i, j)] * (p_prime[(i, j)] - p_prime[(i - 1, j)]);
        }
    }
    let mut v = v.clone();
    for j in 1..ncy {
        for i in 0..ncx {
            v[(i, j)] -= d_v[(i, j)] * (p_prime[(i, j)] - p_prime[(i, j - 1)]);
        }
    }
    (u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{GaussSeidel, SparseLu};
    use crate::numerical::max_abs;
    use approx::assert_relative_eq;

    /// Closed 3x3-cell box with a non-solenoidal interior and uniform `d`.
    fn disturbed_prediction() -> MomentumPrediction {
        let mut u = DMatrix::<f64>::zeros(4, 3);
        let mut v = DMatrix::<f64>::zeros(3, 4);
        u[(1, 0)] = 0.4;
        u[(2, 1)] = -0.3;
        u[(1, 2)] = 0.1;
        v[(1, 1)] = 0.2;
        v[(2, 2)] = -0.5;
        v[(0, 2)] = 0.25;

        let mut d_u = DMatrix::<f64>::zeros(4, 3);
        d_u.rows_mut(1, 2).fill(0.7);
        let mut d_v = DMatrix::<f64>::zeros(3, 4);
        d_v.columns_mut(1, 2).fill(0.9);
        MomentumPrediction { u, v, d_u, d_v }
    }

    #[test]
    fn test_assembly_structure() {
        let prediction = disturbed_prediction();
        let (system, rhs) = assemble_pressure_correction(&prediction, CellSize2D(0.5, 0.5));
        assert_eq!(system.n(), 9);
        assert_eq!(rhs[0], 0.0);

        // Row sums vanish (pure Neumann) except the pinned row.
        let ones = vec![1.0; 9];
        let row_sums = system.multiply(&ones).unwrap();
        assert_eq!(row_sums[0], 1.0);
        for sum in &row_sums[1..] {
            assert_relative_eq!(*sum, 0.0, epsilon = 1e-14);
        }
        // Centre cell couples to all four neighbours.
        let centre: Vec<_> = system.triplets().iter().filter(|t| t.0 == 4).collect();
        assert_eq!(centre.len(), 5);
    }

    #[test]
    fn test_correction_removes_mass_imbalance() {
        let prediction = disturbed_prediction();
        let cell_size = CellSize2D(0.5, 0.5);
        let before = mass_imbalance(&prediction.u, &prediction.v, 0.5, 0.5);
        // Closed box: the imbalance sums to zero, so the pinned system is consistent.
        assert_relative_eq!(before.sum(), 0.0, epsilon = 1e-14);
        assert!(max_abs(&before) > 0.1);

        let p_prime = solve_pressure_correction(&prediction, cell_size, &SparseLu).unwrap();
        assert_eq!(p_prime.shape(), (3, 3));
        assert_eq!(p_prime[(0, 0)], 0.0);

        let (u, v) = correct_velocities(&prediction, &p_prime);
        let after = mass_imbalance(&u, &v, 0.5, 0.5);
        assert!(max_abs(&after) < 1e-10, "residual imbalance {}", max_abs(&after));
        // Boundary faces are never corrected.
        assert_eq!(u.row(0), prediction.u.row(0));
        assert_eq!(v.column(3), prediction.v.column(3));
    }

    #[test]
    fn test_gauss_seidel_matches_lu() {
        let prediction = disturbed_prediction();
        let cell_size = CellSize2D(0.5, 0.5);
        let lu = solve_pressure_correction(&prediction, cell_size, &SparseLu).unwrap();
        let gs = solve_pressure_correction(
            &prediction,
            cell_size,
            &GaussSeidel { max_iterations: 20_000, tolerance: 1e-13 },
        )
        .unwrap();
        assert_relative_eq!(lu, gs, epsilon = 1e-8);
    }

    #[test]
    fn test_solver_failure_propagates() {
        let prediction = disturbed_prediction();
        let result = solve_pressure_correction(
            &prediction,
            CellSize2D(0.5, 0.5),
            &GaussSeidel { max_iterations: 1, tolerance: 1e-14 },
        );
        assert!(matches!(result, Err(LinearSolverError::SolverDivergence { .. })));
    }
}
