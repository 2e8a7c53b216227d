pub mod interpolate;
pub mod stencil;

use nalgebra::DMatrix;

/// Volumetric mass imbalance (per unit depth) of every pressure cell:
/// `(u_e - u_w) * hy + (v_n - v_s) * hx`.
///
/// `u` is `nx x (ny-1)`, `v` is `(nx-1) x ny`; the result is `(nx-1) x (ny-1)`.
pub fn mass_imbalance(u: &DMatrix<f64>, v: &DMatrix<f64>, hx: f64, hy: f64) -> DMatrix<f64> {
    let nx = u.nrows() - 1;
    let ny = u.ncols();
    assert_eq!(v.nrows(), nx, "Incompatible dimensions between u and v");
    assert_eq!(v.ncols(), ny + 1, "Incompatible dimensions between u and v");

    let mut b = DMatrix::<f64>::zeros(nx, ny);
    for c in 0..ny {
        for r in 0..nx {
            let x_flux = (u[(r + 1, c)] - u[(r, c)]) * hy;
            let y_flux = (v[(r, c + 1)] - v[(r, c)]) * hx;
            b[(r, c)] = x_flux + y_flux;
        }
    }
    b
}

/// `f64::max` that keeps a NaN instead of discarding it.
pub(crate) fn max_propagating_nan(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() {
        f64::NAN
    } else {
        acc.max(x)
    }
}

/// Largest absolute entry, 0 for an empty matrix and NaN if any entry is NaN.
pub fn max_abs(field: &DMatrix<f64>) -> f64 {
    field.iter().fold(0.0, |acc, x| max_propagating_nan(acc, x.abs()))
}

/// Largest absolute difference between two matrices of the same shape.
/// NaN if any difference is NaN.
pub fn max_abs_difference(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    assert_eq!(a.shape(), b.shape(), "Matrices must have the same shape");
    a.iter()
        .zip(b.iter())
        .fold(0.0, |acc, (x, y)| max_propagating_nan(acc, (x - y).abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    #[test]
    fn test_mass_imbalance() {
        // nx = 3, ny = 3 nodes: 2x2 cells.
        let u = dmatrix![
            1.0, 1.0;
            2.0, 0.5;
            2.0, 0.0
        ];
        let v = dmatrix![
            0.0, 1.0, 0.0;
            0.0, 0.0, 0.0
        ];
        let b = mass_imbalance(&u, &v, 0.5, 0.25);

        let expected = dmatrix![
            (2.0 - 1.0) * 0.25 + (1.0 - 0.0) * 0.5, (0.5 - 1.0) * 0.25 + (0.0 - 1.0) * 0.5;
            (2.0 - 2.0) * 0.25, (0.0 - 0.5) * 0.25
        ];
        assert_relative_eq!(b, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_flow_is_divergence_free() {
        let u = DMatrix::<f64>::from_element(5, 4, 1.3);
        let v = DMatrix::<f64>::from_element(4, 5, -0.7);
        let b = mass_imbalance(&u, &v, 0.1, 0.2);
        assert_eq!(max_abs(&b), 0.0);
    }

    #[test]
    fn test_max_abs_helpers() {
        let a = dmatrix![1.0, -3.0; 2.0, 0.5];
        let b = dmatrix![1.5, -3.0; 2.0, -0.5];
        assert_eq!(max_abs(&a), 3.0);
        assert_eq!(max_abs_difference(&a, &b), 1.0);
        assert_eq!(max_abs(&DMatrix::<f64>::zeros(0, 3)), 0.0);
    }

    #[test]
    fn test_max_abs_helpers_keep_non_finite_values() {
        let nan = DMatrix::<f64>::from_element(2, 2, f64::NAN);
        assert!(max_abs(&nan).is_nan());

        // A single NaN anywhere, including after larger entries.
        let mixed = dmatrix![5.0, f64::NAN; 1.0, 2.0];
        assert!(max_abs(&mixed).is_nan());
        let zeros = DMatrix::<f64>::zeros(2, 2);
        assert!(max_abs_difference(&zeros, &mixed).is_nan());

        let inf = dmatrix![0.0, f64::NEG_INFINITY; 1.0, 2.0];
        assert_eq!(max_abs(&inf), f64::INFINITY);
        assert_eq!(max_abs_difference(&zeros, &inf), f64::INFINITY);
    }
}
