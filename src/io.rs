//! JSON snapshots of a solution, for restart and for plotting elsewhere.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::boundary::bc2d::Boundaries2D;
use crate::domain::grid2d::{Domain2D, Fluid, Grid2D, GridDimensions2D};
use crate::error::GridError;
use crate::numerical::interpolate::{interpolate_u_to_cell_centres, interpolate_v_to_cell_centres};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Metadata {
    pub nx: usize,
    pub ny: usize,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub hx: f64,
    pub hy: f64,
    pub rho: f64,
    pub mu: f64,
    pub iterations: usize,
}

/// Fields are flattened column-major, as stored by `DMatrix`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub metadata: Metadata,
    pub boundaries: Boundaries2D,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub p: Vec<f64>,
    pub x_centres: Vec<f64>,
    pub y_centres: Vec<f64>,
    pub u_centres: Vec<f64>,
    pub v_centres: Vec<f64>,
}

impl Snapshot {
    pub fn capture(grid: &Grid2D, iterations: usize) -> Self {
        let GridDimensions2D(nx, ny) = grid.dimensions();
        let domain = grid.domain();
        let cell_size = grid.cell_size();
        let fluid = grid.fluid();

        Self {
            metadata: Metadata {
                nx,
                ny,
                x0: domain.x0,
                x1: domain.x1,
                y0: domain.y0,
                y1: domain.y1,
                hx: cell_size.0,
                hy: cell_size.1,
                rho: fluid.rho,
                mu: fluid.mu,
                iterations,
            },
            boundaries: *grid.boundaries(),
            u: grid.u().as_slice().to_vec(),
            v: grid.v().as_slice().to_vec(),
            p: grid.p().as_slice().to_vec(),
            x_centres: grid.x_centres(),
            y_centres: grid.y_centres(),
            u_centres: interpolate_u_to_cell_centres(grid.u()).as_slice().to_vec(),
            v_centres: interpolate_v_to_cell_centres(grid.v()).as_slice().to_vec(),
        }
    }

    /// Rebuilds the grid the snapshot was taken from.
    pub fn restore(&self) -> Result<Grid2D, GridError> {
        let m = &self.metadata;
        let domain = Domain2D { x0: m.x0, x1: m.x1, y0: m.y0, y1: m.y1 };
        let mut grid = Grid2D::new(GridDimensions2D(m.nx, m.ny), domain)?
            .with_fluid(Fluid { rho: m.rho, mu: m.mu })
            .with_boundaries(self.boundaries);

        let shape = grid.shape();
        let u = to_matrix("u", shape.u(), &self.u)?;
        let v = to_matrix("v", shape.v(), &self.v)?;
        let p = to_matrix("p", shape.p(), &self.p)?;
        grid.replace_fields(u, v, p)?;
        Ok(grid)
    }
}

fn to_matrix(
    field: &'static str,
    (rows, cols): (usize, usize),
    values: &[f64],
) -> Result<DMatrix<f64>, GridError> {
    if values.len() != rows * cols {
        return Err(GridError::ShapeMismatch {
            field,
            expected: (rows, cols),
            found: (values.len(), 1),
        });
    }
    Ok(DMatrix::from_column_slice(rows, cols, values))
}

pub fn write_snapshot(snapshot: &Snapshot, path: &Path) -> io::Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() {
            fs::create_dir_all(parent_dir)?;
            info!("Ensured output directory exists: {}", parent_dir.display());
        }
    }

    info!("Writing snapshot to {}...", path.display());
    let start = Instant::now();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)
        .map_err(|e| io::Error::other(format!("Failed to serialize snapshot: {}", e)))?;
    writer.flush()?;
    info!("Snapshot written in {:.2}ms", start.elapsed().as_millis());
    Ok(())
}

pub fn read_snapshot(path: &Path) -> io::Result<Snapshot> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Malformed snapshot: {}", e)))
}
