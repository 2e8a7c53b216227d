use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::boundary::bc2d::{apply_velocity_boundaries, Boundaries2D};
use crate::error::GridError;
use crate::numerical::stencil::{Corners, Cross, UStencil, VStencil};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDimensions2D(pub usize, pub usize); // nx, ny (nodes)

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize2D(pub f64, pub f64); // hx, hy

/// Physical extent of the rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain2D {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl Default for Domain2D {
    fn default() -> Self {
        Self { x0: 0.0, x1: 1.0, y0: 0.0, y1: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fluid {
    pub rho: f64, // density [kg/m^3]
    pub mu: f64,  // dynamic viscosity [Pa s]
}

impl Default for Fluid {
    // Water at room temperature.
    fn default() -> Self {
        Self { rho: 998.0, mu: 8.94e-4 }
    }
}

impl Fluid {
    pub fn kinematic_viscosity(&self) -> f64 {
        self.mu / self.rho
    }
}

/// Array shapes of the staggered layout, derived once from the node counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaggeredShape {
    nx: usize,
    ny: usize,
}

impl StaggeredShape {
    pub fn nodes(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn cells(&self) -> (usize, usize) {
        (self.nx - 1, self.ny - 1)
    }

    pub fn u(&self) -> (usize, usize) {
        (self.nx, self.ny - 1)
    }

    pub fn v(&self) -> (usize, usize) {
        (self.nx - 1, self.ny)
    }

    pub fn p(&self) -> (usize, usize) {
        self.cells()
    }
}

#[derive(Debug, Clone)]
pub struct Grid2D {
    dimensions: GridDimensions2D,
    domain: Domain2D,
    cell_size: CellSize2D,
    shape: StaggeredShape,
    fluid: Fluid,
    boundaries: Boundaries2D,
    u: DMatrix<f64>, // nx x (ny-1)
    v: DMatrix<f64>, // (nx-1) x ny
    p: DMatrix<f64>, // (nx-1) x (ny-1)
}

impl Grid2D {
    /// Staggered layout for `nx x ny` nodes (here 5 x 4):
    ///
    /// ```text
    ///     + - ↑ - + - ↑ - + - ↑ - + - ↑ - +     ↑  v (horizontal faces)
    ///     |       |       |       |       |
    ///     →   •   →   •   →   •   →   •   →     →  u (vertical faces)
    ///     |       |       |       |       |
    ///     + - ↑ - + - ↑ - + - ↑ - + - ↑ - +     •  p (cell centres)
    ///     |       |       |       |       |
    ///     →   •   →   •   →   •   →   •   →
    ///     |       |       |       |       |
    ///     + - ↑ - + - ↑ - + - ↑ - + - ↑ - +
    ///     |       |       |       |       |
    ///     →   •   →   •   →   •   →   •   →
    ///     |       |       |       |       |
    ///     + - ↑ - + - ↑ - + - ↑ - + - ↑ - +
    /// ```
    ///
    /// The grid starts at rest with water properties and the default channel
    /// boundaries already imposed.
    pub fn new(dimensions: GridDimensions2D, domain: Domain2D) -> Result<Self, GridError> {
        let GridDimensions2D(nx, ny) = dimensions;
        if nx < 2 || ny < 2 {
            return Err(GridError::InvalidDimension(format!(
                "Grid needs at least 2x2 nodes, got {}x{}",
                nx, ny
            )));
        }
        let Domain2D { x0, x1, y0, y1 } = domain;
        if ![x0, x1, y0, y1].iter().all(|x| x.is_finite()) || x1 <= x0 || y1 <= y0 {
            return Err(GridError::InvalidDimension(format!(
                "Domain [{}, {}] x [{}, {}] must be finite with positive extent",
                x0, x1, y0, y1
            )));
        }

        let shape = StaggeredShape { nx, ny };
        let cell_size = CellSize2D((x1 - x0) / (nx - 1) as f64, (y1 - y0) / (ny - 1) as f64);
        let (ur, uc) = shape.u();
        let (vr, vc) = shape.v();
        let (pr, pc) = shape.p();

        let mut grid = Self {
            dimensions,
            domain,
            cell_size,
            shape,
            fluid: Fluid::default(),
            boundaries: Boundaries2D::default(),
            u: DMatrix::zeros(ur, uc),
            v: DMatrix::zeros(vr, vc),
            p: DMatrix::zeros(pr, pc),
        };
        grid.set_boundaries();
        Ok(grid)
    }

    pub fn with_fluid(mut self, fluid: Fluid) -> Self {
        self.fluid = fluid;
        self
    }

    pub fn with_boundaries(mut self, boundaries: Boundaries2D) -> Self {
        self.boundaries = boundaries;
        self.set_boundaries();
        self
    }

    pub fn dimensions(&self) -> GridDimensions2D {
        self.dimensions
    }

    pub fn domain(&self) -> Domain2D {
        self.domain
    }

    pub fn cell_size(&self) -> CellSize2D {
        self.cell_size
    }

    pub fn shape(&self) -> StaggeredShape {
        self.shape
    }

    pub fn fluid(&self) -> Fluid {
        self.fluid
    }

    pub fn boundaries(&self) -> &Boundaries2D {
        &self.boundaries
    }

    pub fn u(&self) -> &DMatrix<f64> {
        &self.u
    }

    pub fn v(&self) -> &DMatrix<f64> {
        &self.v
    }

    pub fn p(&self) -> &DMatrix<f64> {
        &self.p
    }

    pub fn set_u(&mut self, i: usize, j: usize, value: f64) {
        self.u[(i, j)] = value;
    }

    pub fn set_v(&mut self, i: usize, j: usize, value: f64) {
        self.v[(i, j)] = value;
    }

    pub fn set_p(&mut self, i: usize, j: usize, value: f64) {
        self.p[(i, j)] = value;
    }

    /// Swaps in a whole new solution; shapes must match the layout.
    pub fn replace_fields(
        &mut self,
        u: DMatrix<f64>,
        v: DMatrix<f64>,
        p: DMatrix<f64>,
    ) -> Result<(), GridError> {
        check_shape("u", self.shape.u(), &u)?;
        check_shape("v", self.shape.v(), &v)?;
        check_shape("p", self.shape.p(), &p)?;
        self.u = u;
        self.v = v;
        self.p = p;
        Ok(())
    }

    /// Re-imposes the boundary conditions on `u` and `v`.
    pub fn set_boundaries(&mut self) {
        apply_velocity_boundaries(&self.boundaries, &mut self.u, &mut self.v, self.cell_size);
    }

    pub fn u_stencil(&self, i: usize, j: usize) -> UStencil {
        u_stencil(&self.u, &self.v, &self.boundaries, i, j)
    }

    pub fn v_stencil(&self, i: usize, j: usize) -> VStencil {
        v_stencil(&self.u, &self.v, &self.boundaries, i, j)
    }

    pub fn x_nodes(&self) -> Vec<f64> {
        let (nx, _) = self.shape.nodes();
        (0..nx).map(|i| self.domain.x0 + i as f64 * self.cell_size.0).collect()
    }

    pub fn y_nodes(&self) -> Vec<f64> {
        let (_, ny) = self.shape.nodes();
        (0..ny).map(|j| self.domain.y0 + j as f64 * self.cell_size.1).collect()
    }

    pub fn x_centres(&self) -> Vec<f64> {
        let (ncx, _) = self.shape.cells();
        (0..ncx).map(|i| self.domain.x0 + (i as f64 + 0.5) * self.cell_size.0).collect()
    }

    pub fn y_centres(&self) -> Vec<f64> {
        let (_, ncy) = self.shape.cells();
        (0..ncy).map(|j| self.domain.y0 + (j as f64 + 0.5) * self.cell_size.1).collect()
    }
}

fn check_shape(
    field: &'static str,
    expected: (usize, usize),
    matrix: &DMatrix<f64>,
) -> Result<(), GridError> {
    if matrix.shape() != expected {
        return Err(GridError::ShapeMismatch { field, expected, found: matrix.shape() });
    }
    Ok(())
}

/// Neighbourhood of the interior u-face `(i, j)`, `1 <= i <= nx-2`.
///
/// The west/east neighbours always exist (possibly boundary faces). South and
/// north neighbours past the first/last cell row are ghosts built from the
/// south/north boundary condition.
pub fn u_stencil(
    u: &DMatrix<f64>,
    v: &DMatrix<f64>,
    boundaries: &Boundaries2D,
    i: usize,
    j: usize,
) -> UStencil {
    debug_assert!(i >= 1 && i + 1 < u.nrows(), "u-face {} is not interior", i);
    let top = u.ncols() - 1;
    let centre = u[(i, j)];
    let south = if j == 0 { boundaries.south.ghost(centre) } else { u[(i, j - 1)] };
    let north = if j == top { boundaries.north.ghost(centre) } else { u[(i, j + 1)] };

    UStencil {
        u: Cross { centre, west: u[(i - 1, j)], east: u[(i + 1, j)], south, north },
        v: Corners {
            south_west: v[(i - 1, j)],
            south_east: v[(i, j)],
            north_west: v[(i - 1, j + 1)],
            north_east: v[(i, j + 1)],
        },
    }
}

/// Neighbourhood of the interior v-face `(i, j)`, `1 <= j <= ny-2`.
pub fn v_stencil(
    u: &DMatrix<f64>,
    v: &DMatrix<f64>,
    boundaries: &Boundaries2D,
    i: usize,
    j: usize,
) -> VStencil {
    debug_assert!(j >= 1 && j + 1 < v.ncols(), "v-face {} is not interior", j);
    let right = v.nrows() - 1;
    let centre = v[(i, j)];
    let west = if i == 0 { boundaries.west.ghost(centre) } else { v[(i - 1, j)] };
    let east = if i == right { boundaries.east.ghost(centre) } else { v[(i + 1, j)] };

    VStencil {
        v: Cross { centre, west, east, south: v[(i, j - 1)], north: v[(i, j + 1)] },
        u: Corners {
            south_west: u[(i, j - 1)],
            south_east: u[(i + 1, j - 1)],
            north_west: u[(i, j)],
            north_east: u[(i + 1, j)],
        },
    }
}
