use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::grid2d::CellSize2D;
use crate::error::BoundaryError;

/// Outflow below this (relative to the inflow) is treated as "no outflow yet".
const OUTFLOW_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    North,
    South,
    East,
    West,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::North, Edge::South, Edge::East, Edge::West];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Prescribed normal velocity entering the domain.
    Inlet,
    /// Zero-gradient outflow.
    Outlet,
    /// Stationary wall; `value` is written into the normal component.
    Wall,
    /// No-penetration wall sliding tangentially at `value` (lid).
    MovingWall,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    pub kind: BoundaryKind,
    pub value: f64,
}

impl BoundaryCondition {
    pub fn inlet(velocity: f64) -> Self {
        Self { kind: BoundaryKind::Inlet, value: velocity }
    }

    pub fn outlet() -> Self {
        Self { kind: BoundaryKind::Outlet, value: 0.0 }
    }

    pub fn wall() -> Self {
        Self { kind: BoundaryKind::Wall, value: 0.0 }
    }

    pub fn moving_wall(speed: f64) -> Self {
        Self { kind: BoundaryKind::MovingWall, value: speed }
    }

    pub fn is_outlet(&self) -> bool {
        self.kind == BoundaryKind::Outlet
    }

    /// Value written into the boundary row/column of the normal velocity
    /// component. Not used for outlets, which are extrapolated instead.
    pub fn normal_value(&self) -> f64 {
        match self.kind {
            BoundaryKind::MovingWall => 0.0,
            _ => self.value,
        }
    }

    /// Value of the tangential component one cell outside the domain, given
    /// the value of the first interior face next to the edge.
    pub fn ghost(&self, interior: f64) -> f64 {
        match self.kind {
            BoundaryKind::Outlet => interior,
            BoundaryKind::MovingWall => 2.0 * self.value - interior,
            BoundaryKind::Wall | BoundaryKind::Inlet => -interior,
        }
    }

    /// Coefficient `r` in `ghost = r * interior + c`.
    pub fn reflection(&self) -> f64 {
        match self.kind {
            BoundaryKind::Outlet => 1.0,
            BoundaryKind::Wall | BoundaryKind::Inlet | BoundaryKind::MovingWall => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundaries2D {
    pub north: BoundaryCondition,
    pub south: BoundaryCondition,
    pub east: BoundaryCondition,
    pub west: BoundaryCondition,
}

impl Default for Boundaries2D {
    fn default() -> Self {
        Self::channel(1.0)
    }
}

impl Boundaries2D {
    pub fn new(
        north: BoundaryCondition,
        south: BoundaryCondition,
        east: BoundaryCondition,
        west: BoundaryCondition,
    ) -> Result<Self, BoundaryError> {
        let boundaries = Self { north, south, east, west };
        boundaries.validate()?;
        Ok(boundaries)
    }

    /// Flow entering through the west edge and leaving through the east edge
    /// between two stationary walls.
    pub fn channel(inlet_velocity: f64) -> Self {
        Self {
            north: BoundaryCondition::wall(),
            south: BoundaryCondition::wall(),
            east: BoundaryCondition::outlet(),
            west: BoundaryCondition::inlet(inlet_velocity),
        }
    }

    /// Closed box whose north wall slides in +x at `lid_speed`.
    pub fn lid_driven_cavity(lid_speed: f64) -> Self {
        Self {
            north: BoundaryCondition::moving_wall(lid_speed),
            south: BoundaryCondition::wall(),
            east: BoundaryCondition::wall(),
            west: BoundaryCondition::wall(),
        }
    }

    pub fn get(&self, edge: Edge) -> BoundaryCondition {
        match edge {
            Edge::North => self.north,
            Edge::South => self.south,
            Edge::East => self.east,
            Edge::West => self.west,
        }
    }

    pub fn set(&mut self, edge: Edge, condition: BoundaryCondition) -> Result<(), BoundaryError> {
        if !condition.value.is_finite() {
            return Err(BoundaryError::InvalidBoundaryCondition(format!(
                "{:?} edge: value {} is not finite",
                edge, condition.value
            )));
        }
        match edge {
            Edge::North => self.north = condition,
            Edge::South => self.south = condition,
            Edge::East => self.east = condition,
            Edge::West => self.west = condition,
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), BoundaryError> {
        for edge in Edge::ALL {
            let bc = self.get(edge);
            if !bc.value.is_finite() {
                return Err(BoundaryError::InvalidBoundaryCondition(format!(
                    "{:?} edge: value {} is not finite",
                    edge, bc.value
                )));
            }
        }
        Ok(())
    }

    pub fn has_outlet(&self) -> bool {
        Edge::ALL.iter().any(|&edge| self.get(edge).is_outlet())
    }
}

/// Volumetric flow (per unit depth) leaving the domain through `edge`.
pub fn outward_flux(edge: Edge, u: &DMatrix<f64>, v: &DMatrix<f64>, cell_size: CellSize2D) -> f64 {
    let CellSize2D(hx, hy) = cell_size;
    match edge {
        Edge::East => u.row(u.nrows() - 1).sum() * hy,
        Edge::West => -u.row(0).sum() * hy,
        Edge::North => v.column(v.ncols() - 1).sum() * hx,
        Edge::South => -v.column(0).sum() * hx,
    }
}

/// Net flow entering the domain through every edge that is not an outlet.
pub fn net_inflow(
    boundaries: &Boundaries2D,
    u: &DMatrix<f64>,
    v: &DMatrix<f64>,
    cell_size: CellSize2D,
) -> f64 {
    Edge::ALL
        .iter()
        .filter(|&&edge| !boundaries.get(edge).is_outlet())
        .map(|&edge| -outward_flux(edge, u, v, cell_size))
        .sum()
}

fn edge_length(edge: Edge, u: &DMatrix<f64>, v: &DMatrix<f64>, cell_size: CellSize2D) -> f64 {
    let CellSize2D(hx, hy) = cell_size;
    match edge {
        Edge::East | Edge::West => u.ncols() as f64 * hy,
        Edge::North | Edge::South => v.nrows() as f64 * hx,
    }
}

fn scale_edge(edge: Edge, factor: f64, u: &mut DMatrix<f64>, v: &mut DMatrix<f64>) {
    let (nx, ny) = (u.nrows(), v.ncols());
    match edge {
        Edge::East => u.row_mut(nx - 1).scale_mut(factor),
        Edge::West => u.row_mut(0).scale_mut(factor),
        Edge::North => v.column_mut(ny - 1).scale_mut(factor),
        Edge::South => v.column_mut(0).scale_mut(factor),
    }
}

fn set_outward_speed(edge: Edge, speed: f64, u: &mut DMatrix<f64>, v: &mut DMatrix<f64>) {
    let (nx, ny) = (u.nrows(), v.ncols());
    match edge {
        Edge::East => u.row_mut(nx - 1).fill(speed),
        Edge::West => u.row_mut(0).fill(-speed),
        Edge::North => v.column_mut(ny - 1).fill(speed),
        Edge::South => v.column_mut(0).fill(-speed),
    }
}

/// Imposes `boundaries` on a staggered pair of velocity arrays.
///
/// Inlet and wall edges receive their Dirichlet value in the boundary
/// row/column of the normal component. Outlet faces copy the adjacent
/// interior face and are then rescaled by a single factor so that the total
/// outflow matches the net inflow through the other edges. If the copied
/// outflow is negligible or points back into the domain, the net inflow is
/// spread uniformly over the outlet faces instead.
///
/// Applying this twice gives the same arrays as applying it once.
pub fn apply_velocity_boundaries(
    boundaries: &Boundaries2D,
    u: &mut DMatrix<f64>,
    v: &mut DMatrix<f64>,
    cell_size: CellSize2D,
) {
    let nx = u.nrows();
    let ny = v.ncols();

    for edge in Edge::ALL {
        let bc = boundaries.get(edge);
        if bc.is_outlet() {
            continue;
        }
        let value = bc.normal_value();
        match edge {
            Edge::West => u.row_mut(0).fill(value),
            Edge::East => u.row_mut(nx - 1).fill(value),
            Edge::South => v.column_mut(0).fill(value),
            Edge::North => v.column_mut(ny - 1).fill(value),
        }
    }

    let outlets: Vec<Edge> = Edge::ALL
        .into_iter()
        .filter(|&edge| boundaries.get(edge).is_outlet())
        .collect();
    if outlets.is_empty() {
        return;
    }

    for &edge in &outlets {
        match edge {
            Edge::West => {
                let interior = u.row(1).into_owned();
                u.row_mut(0).copy_from(&interior);
            }
            Edge::East => {
                let interior = u.row(nx - 2).into_owned();
                u.row_mut(nx - 1).copy_from(&interior);
            }
            Edge::South => {
                let interior = v.column(1).into_owned();
                v.column_mut(0).copy_from(&interior);
            }
            Edge::North => {
                let interior = v.column(ny - 2).into_owned();
                v.column_mut(ny - 1).copy_from(&interior);
            }
        }
    }

    let inflow = net_inflow(boundaries, u, v, cell_size);
    let outflow: f64 = outlets
        .iter()
        .map(|&edge| outward_flux(edge, u, v, cell_size))
        .sum();

    if outflow.abs() > OUTFLOW_EPS * (1.0 + inflow.abs()) && inflow * outflow > 0.0 {
        let factor = inflow / outflow;
        for &edge in &outlets {
            scale_edge(edge, factor, u, v);
        }
    } else {
        let length: f64 = outlets
            .iter()
            .map(|&edge| edge_length(edge, u, v, cell_size))
            .sum();
        let speed = inflow / length;
        for &edge in &outlets {
            set_outward_speed(edge, speed, u, v);
        }
    }
}
