use nalgebra::DMatrix;

/// Averages the two vertical faces of every cell: `nx x (ny-1)` -> `(nx-1) x (ny-1)`.
pub fn interpolate_u_to_cell_centres(u: &DMatrix<f64>) -> DMatrix<f64> {
    let target_nx = u.nrows().saturating_sub(1);
    let target_ny = u.ncols();
    DMatrix::from_fn(target_nx, target_ny, |r, c| 0.5 * (u[(r, c)] + u[(r + 1, c)]))
}

/// Averages the two horizontal faces of every cell: `(nx-1) x ny` -> `(nx-1) x (ny-1)`.
pub fn interpolate_v_to_cell_centres(v: &DMatrix<f64>) -> DMatrix<f64> {
    let target_nx = v.nrows();
    let target_ny = v.ncols().saturating_sub(1);
    DMatrix::from_fn(target_nx, target_ny, |r, c| 0.5 * (v[(r, c)] + v[(r, c + 1)]))
}

/// Velocity magnitude at cell centres.
pub fn speed_at_cell_centres(u: &DMatrix<f64>, v: &DMatrix<f64>) -> DMatrix<f64> {
    let uc = interpolate_u_to_cell_centres(u);
    let vc = interpolate_v_to_cell_centres(v);
    uc.zip_map(&vc, |a, b| a.hypot(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    #[test]
    fn test_interpolate_u_to_cell_centres() {
        let u = dmatrix![
            17.0, 24.0,  1.0;
            23.0,  5.0,  7.0;
             4.0,  6.0, 13.0;
            10.0, 12.0, 19.0
        ];

        let uc = interpolate_u_to_cell_centres(&u);

        let expected = dmatrix![
            20.0, 14.5,  4.0;
            13.5,  5.5, 10.0;
             7.0,  9.0, 16.0
        ];
        assert_eq!(uc.shape(), (3, 3));
        assert_relative_eq!(uc, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_v_to_cell_centres() {
        let v = dmatrix![
             1.0,  2.0,  3.0,  4.0;
             6.0,  7.0,  8.0,  9.0;
            11.0, 12.0, 13.0, 14.0
        ];

        let vc = interpolate_v_to_cell_centres(&v);

        let expected = dmatrix![
             1.5,  2.5,  3.5;
             6.5,  7.5,  8.5;
            11.5, 12.5, 13.5
        ];
        assert_eq!(vc.shape(), (3, 3));
        assert_relative_eq!(vc, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_speed_at_cell_centres() {
        let u = DMatrix::<f64>::from_element(3, 2, 3.0);
        let v = DMatrix::<f64>::from_element(2, 3, 4.0);
        let speed = speed_at_cell_centres(&u, &v);
        assert_eq!(speed.shape(), (2, 2));
        assert_relative_eq!(speed, DMatrix::from_element(2, 2, 5.0), epsilon = 1e-12);
    }
}
