//! Finite-volume advection and diffusion operators evaluated on the local
//! neighbourhood of a single staggered velocity face.
//!
//! ```text
//!        NW ------ N ------ NE
//!        |                  |
//!        W        P         E
//!        |                  |
//!        SW ------ S ------ SE
//! ```
//!
//! A [`Cross`] holds the face's own velocity component at `P` and its four
//! neighbours. A [`Corners`] holds the other component at the corners of the
//! face's control volume.

/// One velocity component at a face and its four axis neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cross {
    pub centre: f64,
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

/// The other velocity component at the four corners of the control volume.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Corners {
    pub south_west: f64,
    pub south_east: f64,
    pub north_west: f64,
    pub north_east: f64,
}

/// Neighbourhood of a u-face: `u` around it, `v` on the adjacent horizontal faces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UStencil {
    pub u: Cross,
    pub v: Corners,
}

/// Neighbourhood of a v-face: `v` around it, `u` on the adjacent vertical faces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VStencil {
    pub v: Cross,
    pub u: Corners,
}

/// Advecting velocities through the four sides of a face's control volume,
/// midpoint-averaged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceFluxes {
    pub east: f64,
    pub west: f64,
    pub north: f64,
    pub south: f64,
}

impl UStencil {
    pub fn fluxes(&self) -> FaceFluxes {
        let Cross { centre, west, east, .. } = self.u;
        FaceFluxes {
            east: 0.5 * (centre + east),
            west: 0.5 * (west + centre),
            north: 0.5 * (self.v.north_west + self.v.north_east),
            south: 0.5 * (self.v.south_west + self.v.south_east),
        }
    }
}

impl VStencil {
    pub fn fluxes(&self) -> FaceFluxes {
        let Cross { centre, south, north, .. } = self.v;
        FaceFluxes {
            east: 0.5 * (self.u.north_east + self.u.south_east),
            west: 0.5 * (self.u.north_west + self.u.south_west),
            north: 0.5 * (centre + north),
            south: 0.5 * (south + centre),
        }
    }
}

/// x-momentum advection `∂(uu)/∂x + ∂(uv)/∂y` at a u-face.
///
/// Face values are midpoint averages; the normal term squares the averaged
/// `u`, the shear term multiplies averaged `u` by averaged `v`. This is a
/// second-order central scheme with no upwinding.
pub fn advection_x(u: &Cross, v: &Corners, hx: f64, hy: f64) -> f64 {
    let normal = (u.east + u.centre).powi(2) - (u.centre + u.west).powi(2);
    let shear = (u.centre + u.north) * (v.north_west + v.north_east)
        - (u.centre + u.south) * (v.south_west + v.south_east);
    0.25 * normal / hx + 0.25 * shear / hy
}

/// y-momentum advection `∂(uv)/∂x + ∂(vv)/∂y` at a v-face.
pub fn advection_y(v: &Cross, u: &Corners, hx: f64, hy: f64) -> f64 {
    let shear = (u.north_east + u.south_east) * (v.centre + v.east)
        - (u.north_west + u.south_west) * (v.west + v.centre);
    let normal = (v.north + v.centre).powi(2) - (v.centre + v.south).powi(2);
    0.25 * shear / hx + 0.25 * normal / hy
}

fn laplacian(c: &Cross, hx: f64, hy: f64) -> f64 {
    (c.east + c.west - 2.0 * c.centre) / (hx * hx) + (c.north + c.south - 2.0 * c.centre) / (hy * hy)
}

/// Five-point Laplacian of `u` at a u-face.
pub fn diffusion_x(u: &Cross, hx: f64, hy: f64) -> f64 {
    laplacian(u, hx, hy)
}

/// Five-point Laplacian of `v` at a v-face.
pub fn diffusion_y(v: &Cross, hx: f64, hy: f64) -> f64 {
    laplacian(v, hx, hy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_cross(value: f64) -> Cross {
        Cross { centre: value, west: value, east: value, south: value, north: value }
    }

    #[test]
    fn test_zero_field_gives_zero() {
        let zero_cross = Cross::default();
        let zero_corners = Corners::default();
        assert_eq!(advection_x(&zero_cross, &zero_corners, 0.1, 0.2), 0.0);
        assert_eq!(advection_y(&zero_cross, &zero_corners, 0.1, 0.2), 0.0);
        assert_eq!(diffusion_x(&zero_cross, 0.1, 0.2), 0.0);
        assert_eq!(diffusion_y(&zero_cross, 0.1, 0.2), 0.0);
    }

    #[test]
    fn test_uniform_flow_has_no_advection() {
        let u = uniform_cross(2.0);
        let v = Corners { south_west: 0.5, south_east: 0.5, north_west: 0.5, north_east: 0.5 };
        assert_relative_eq!(advection_x(&u, &v, 0.5, 0.25), 0.0, epsilon = 1e-12);
        assert_relative_eq!(diffusion_x(&u, 0.5, 0.25), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_advection_x_normal_term() {
        // u = x on a unit-spaced row: d(uu)/dx = 2x = 2 at x = 1.
        let u = Cross { centre: 1.0, west: 0.0, east: 2.0, south: 1.0, north: 1.0 };
        let v = Corners::default();
        assert_relative_eq!(advection_x(&u, &v, 1.0, 1.0), 2.0, epsilon = 1e-12);
        // Halving hx doubles the x-derivative and leaves the shear term alone.
        assert_relative_eq!(advection_x(&u, &v, 0.5, 1.0), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_advection_y_shear_term() {
        // v = 1 everywhere, u = 1 on the east faces and 0 on the west faces:
        // d(uv)/dx = (1 * 1 - 0) / hx.
        let v = uniform_cross(1.0);
        let u = Corners { south_west: 0.0, north_west: 0.0, south_east: 1.0, north_east: 1.0 };
        assert_relative_eq!(advection_y(&v, &u, 0.5, 1.0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diffusion_of_quadratic() {
        // f = x^2 + 3 y^2 sampled around (1, 1) with hx = 0.5, hy = 0.25:
        // laplacian = 2 + 6 = 8.
        let f = |x: f64, y: f64| x * x + 3.0 * y * y;
        let (hx, hy) = (0.5, 0.25);
        let c = Cross {
            centre: f(1.0, 1.0),
            west: f(1.0 - hx, 1.0),
            east: f(1.0 + hx, 1.0),
            south: f(1.0, 1.0 - hy),
            north: f(1.0, 1.0 + hy),
        };
        assert_relative_eq!(diffusion_x(&c, hx, hy), 8.0, epsilon = 1e-10);
        assert_relative_eq!(diffusion_y(&c, hx, hy), 8.0, epsilon = 1e-10);
    }

    #[test]
    fn test_fluxes() {
        let s = UStencil {
            u: Cross { centre: 1.0, west: 0.0, east: 3.0, south: 0.0, north: 0.0 },
            v: Corners { south_west: 1.0, south_east: 3.0, north_west: -1.0, north_east: -3.0 },
        };
        let f = s.fluxes();
        assert_eq!(f, FaceFluxes { east: 2.0, west: 0.5, north: -2.0, south: 2.0 });

        let s = VStencil {
            v: Cross { centre: 1.0, west: 0.0, east: 0.0, south: 3.0, north: 5.0 },
            u: Corners { south_west: 1.0, south_east: 2.0, north_west: 3.0, north_east: 4.0 },
        };
        let f = s.fluxes();
        assert_eq!(f, FaceFluxes { east: 3.0, west: 2.0, north: 3.0, south: 2.0 });
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn linear_cross(a: f64, b: f64, k: f64, hx: f64, hy: f64) -> Cross {
        // f(x, y) = a x + b y + k sampled around the origin.
        let f = |x: f64, y: f64| a * x + b * y + k;
        Cross {
            centre: f(0.0, 0.0),
            west: f(-hx, 0.0),
            east: f(hx, 0.0),
            south: f(0.0, -hy),
            north: f(0.0, hy),
        }
    }

    proptest! {
        #[test]
        fn laplacian_of_linear_field_vanishes(
            a in -10.0..10.0_f64,
            b in -10.0..10.0_f64,
            k in -10.0..10.0_f64,
            hx in 0.01..1.0_f64,
            hy in 0.01..1.0_f64,
        ) {
            let c = linear_cross(a, b, k, hx, hy);
            let dx = diffusion_x(&c, hx, hy);
            let dy = diffusion_y(&c, hx, hy);
            prop_assert!(dx.abs() < 1e-8, "Dx = {}", dx);
            prop_assert!(dy.abs() < 1e-8, "Dy = {}", dy);
        }

        #[test]
        fn zero_velocity_is_a_fixed_point(hx in 0.01..1.0_f64, hy in 0.01..1.0_f64) {
            let c = Cross::default();
            let k = Corners::default();
            prop_assert_eq!(advection_x(&c, &k, hx, hy), 0.0);
            prop_assert_eq!(advection_y(&c, &k, hx, hy), 0.0);
        }
    }
}
