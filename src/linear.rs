//! Sparse linear systems and the solvers used for the pressure correction.

use std::collections::BTreeMap;

use rsparse::data::{Sprs, Trpl};
use rsparse::lusol;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LinearSolverError;
use crate::numerical::max_propagating_nan;

/// Square system `A x = b` stored as `(row, col, value)` triplets.
/// Repeated entries for the same position are summed.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseSystem {
    n: usize,
    triplets: Vec<(usize, usize, f64)>,
}

impl SparseSystem {
    pub fn new(n: usize) -> Self {
        Self { n, triplets: Vec::with_capacity(5 * n) }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.triplets.push((row, col, value));
    }

    pub fn triplets(&self) -> &[(usize, usize, f64)] {
        &self.triplets
    }

    /// Entries with duplicates summed, ordered by (row, col).
    fn merged(&self) -> Result<BTreeMap<(usize, usize), f64>, LinearSolverError> {
        let mut entries = BTreeMap::new();
        for &(row, col, value) in &self.triplets {
            if row >= self.n || col >= self.n {
                return Err(LinearSolverError::DimensionMismatch(format!(
                    "Entry ({}, {}) outside a {}x{} system",
                    row, col, self.n, self.n
                )));
            }
            *entries.entry((row, col)).or_insert(0.0) += value;
        }
        Ok(entries)
    }

    /// `A x`.
    pub fn multiply(&self, x: &[f64]) -> Result<Vec<f64>, LinearSolverError> {
        if x.len() != self.n {
            return Err(LinearSolverError::DimensionMismatch(format!(
                "Vector has length {}, expected {}",
                x.len(),
                self.n
            )));
        }
        let mut y = vec![0.0; self.n];
        for &(row, col, value) in &self.triplets {
            if row >= self.n || col >= self.n {
                return Err(LinearSolverError::DimensionMismatch(format!(
                    "Entry ({}, {}) outside a {}x{} system",
                    row, col, self.n, self.n
                )));
            }
            y[row] += value * x[col];
        }
        Ok(y)
    }

    fn check_rhs(&self, b: &[f64]) -> Result<(), LinearSolverError> {
        if b.len() != self.n {
            return Err(LinearSolverError::DimensionMismatch(format!(
                "Right-hand side has length {}, expected {}",
                b.len(),
                self.n
            )));
        }
        Ok(())
    }
}

/// Black-box solver for `A x = b`.
pub trait LinearSolver {
    fn solve(&self, system: &SparseSystem, b: &[f64]) -> Result<Vec<f64>, LinearSolverError>;
}

/// Direct sparse LU factorisation (rsparse).
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseLu;

impl SparseLu {
    fn to_csc(system: &SparseSystem) -> Result<Sprs<f64>, LinearSolverError> {
        let entries = system.merged()?;
        let nnz = entries.len();
        let mut trpl = Trpl::<f64> {
            m: system.n,
            n: system.n,
            p: Vec::with_capacity(nnz), // column indices
            i: Vec::with_capacity(nnz), // row indices
            x: Vec::with_capacity(nnz),
        };
        for ((row, col), value) in entries {
            trpl.i.push(row);
            trpl.p.push(col as isize);
            trpl.x.push(value);
        }

        let mut sprs = Sprs::<f64>::new();
        sprs.from_trpl(&trpl);
        if sprs.m != system.n || sprs.n != system.n {
            return Err(LinearSolverError::DimensionMismatch(format!(
                "CSC conversion produced a {}x{} matrix, expected {}x{}",
                sprs.m, sprs.n, system.n, system.n
            )));
        }
        Ok(sprs)
    }
}

impl LinearSolver for SparseLu {
    fn solve(&self, system: &SparseSystem, b: &[f64]) -> Result<Vec<f64>, LinearSolverError> {
        system.check_rhs(b)?;
        if system.n == 0 {
            return Ok(Vec::new());
        }
        let a = Self::to_csc(system)?;

        let mut x = b.to_vec();
        if let Err(error) = lusol(&a, &mut x, 1, 1e-10) {
            return Err(LinearSolverError::SingularSystem(format!(
                "Sparse LU failed: {}",
                error
            )));
        }
        if x.iter().any(|value| !value.is_finite()) {
            return Err(LinearSolverError::SingularSystem(
                "Sparse LU produced non-finite values".to_string(),
            ));
        }
        Ok(x)
    }
}

/// Point Gauss–Seidel iteration. Fails with `SolverDivergence` when the
/// residual has not dropped below `tolerance` after `max_iterations` sweeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussSeidel {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for GaussSeidel {
    fn default() -> Self {
        Self { max_iterations: 10_000, tolerance: 1e-10 }
    }
}

impl LinearSolver for GaussSeidel {
    fn solve(&self, system: &SparseSystem, b: &[f64]) -> Result<Vec<f64>, LinearSolverError> {
        system.check_rhs(b)?;
        let n = system.n;

        let mut diagonal = vec![0.0; n];
        let mut off_diagonal: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for ((row, col), value) in system.merged()? {
            if row == col {
                diagonal[row] = value;
            } else {
                off_diagonal[row].push((col, value));
            }
        }
        if let Some(row) = diagonal.iter().position(|&d| d == 0.0) {
            return Err(LinearSolverError::SingularSystem(format!(
                "Zero diagonal entry in row {}",
                row
            )));
        }

        let scale = b.iter().fold(1.0_f64, |acc, x| acc.max(x.abs()));
        let mut x = vec![0.0; n];
        let mut residual = f64::INFINITY;
        for iteration in 1..=self.max_iterations {
            for row in 0..n {
                let sum: f64 = off_diagonal[row].iter().map(|&(col, a)| a * x[col]).sum();
                x[row] = (b[row] - sum) / diagonal[row];
            }

            residual = system
                .multiply(&x)?
                .iter()
                .zip(b)
                .fold(0.0, |acc, (ax, bi)| max_propagating_nan(acc, (ax - bi).abs()));
            if !residual.is_finite() {
                break;
            }
            if residual <= self.tolerance * scale {
                debug!(iteration, residual, "Gauss-Seidel converged");
                return Ok(x);
            }
        }

        Err(LinearSolverError::SolverDivergence { iterations: self.max_iterations, residual })
    }
}

/// Serializable choice of linear solver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum LinearSolverKind {
    #[default]
    SparseLu,
    GaussSeidel { max_iterations: usize, tolerance: f64 },
}

impl LinearSolverKind {
    pub fn build(&self) -> Box<dyn LinearSolver> {
        match *self {
            LinearSolverKind::SparseLu => Box::new(SparseLu),
            LinearSolverKind::GaussSeidel { max_iterations, tolerance } => {
                Box::new(GaussSeidel { max_iterations, tolerance })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 1-D Dirichlet Laplacian (tridiagonal 2, -1), symmetric positive definite.
    fn laplacian_1d(n: usize) -> SparseSystem {
        let mut system = SparseSystem::new(n);
        for k in 0..n {
            system.add(k, k, 2.0);
            if k > 0 {
                system.add(k, k - 1, -1.0);
            }
            if k + 1 < n {
                system.add(k, k + 1, -1.0);
            }
        }
        system
    }

    #[test]
    fn test_sparse_lu_solves_small_system() {
        let mut system = SparseSystem::new(3);
        // [4 1 0; 1 3 1; 0 1 2] x = [1 2 3]
        for &(r, c, v) in &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0), (1, 2, 1.0), (2, 1, 1.0), (2, 2, 2.0)] {
            system.add(r, c, v);
        }
        let b = [1.0, 2.0, 3.0];
        let x = SparseLu.solve(&system, &b).unwrap();

        let ax = system.multiply(&x).unwrap();
        for (lhs, rhs) in ax.iter().zip(b.iter()) {
            assert_relative_eq!(lhs, rhs, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_duplicates_are_summed() {
        let mut system = SparseSystem::new(2);
        system.add(0, 0, 1.0);
        system.add(0, 0, 1.0);
        system.add(1, 1, 4.0);
        let x = SparseLu.solve(&system, &[2.0, 2.0]).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_lu_and_gauss_seidel_agree() {
        let system = laplacian_1d(8);
        let b: Vec<f64> = (0..8).map(|k| (k as f64 * 0.7).sin()).collect();

        let direct = SparseLu.solve(&system, &b).unwrap();
        let iterative = GaussSeidel { max_iterations: 5_000, tolerance: 1e-12 }
            .solve(&system, &b)
            .unwrap();

        for (d, i) in direct.iter().zip(iterative.iter()) {
            assert_relative_eq!(d, i, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_gauss_seidel_budget_exceeded() {
        let system = laplacian_1d(50);
        let b = vec![1.0; 50];
        let result = GaussSeidel { max_iterations: 3, tolerance: 1e-12 }.solve(&system, &b);
        match result {
            Err(LinearSolverError::SolverDivergence { iterations, residual }) => {
                assert_eq!(iterations, 3);
                assert!(residual > 0.0);
            }
            other => panic!("Expected divergence, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_pivot_is_singular() {
        let mut system = SparseSystem::new(2);
        system.add(0, 0, 1.0);
        system.add(1, 0, 1.0);
        let result = GaussSeidel::default().solve(&system, &[1.0, 1.0]);
        assert!(matches!(result, Err(LinearSolverError::SingularSystem(_))));
    }

    #[test]
    fn test_rhs_length_checked() {
        let system = laplacian_1d(3);
        assert!(matches!(
            SparseLu.solve(&system, &[1.0, 2.0]),
            Err(LinearSolverError::DimensionMismatch(_))
        ));
        let mut bad = SparseSystem::new(2);
        bad.add(0, 5, 1.0);
        assert!(matches!(
            SparseLu.solve(&bad, &[1.0, 2.0]),
            Err(LinearSolverError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_multiply_checks_dimensions() {
        let system = laplacian_1d(3);
        assert_eq!(system.multiply(&[1.0, 1.0, 1.0]).unwrap(), vec![1.0, 0.0, 1.0]);
        assert!(matches!(
            system.multiply(&[1.0, 1.0]),
            Err(LinearSolverError::DimensionMismatch(_))
        ));

        let mut bad = SparseSystem::new(2);
        bad.add(3, 0, 1.0);
        assert!(matches!(
            bad.multiply(&[1.0, 1.0]),
            Err(LinearSolverError::DimensionMismatch(_))
        ));
        // Gauss-Seidel reports the bad entry instead of indexing past the end.
        assert!(matches!(
            GaussSeidel::default().solve(&bad, &[1.0, 1.0]),
            Err(LinearSolverError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_kind_builds_solver() {
        let system = laplacian_1d(4);
        let b = [1.0, 0.0, 0.0, 1.0];
        let kind = LinearSolverKind::GaussSeidel { max_iterations: 2_000, tolerance: 1e-12 };
        let x = kind.build().solve(&system, &b).unwrap();
        // Symmetric load on the Dirichlet Laplacian gives x = 1 everywhere.
        for value in x {
            assert_relative_eq!(value, 1.0, epsilon = 1e-8);
        }
        assert_eq!(LinearSolverKind::default(), LinearSolverKind::SparseLu);
    }
}
