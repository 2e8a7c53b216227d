use std::env;
use std::path::{Path, PathBuf};

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use simple_staggered::boundary::bc2d::Boundaries2D;
use simple_staggered::domain::grid2d::Fluid;
use simple_staggered::io::{write_snapshot, Snapshot};
use simple_staggered::numerical::interpolate::speed_at_cell_centres;
use simple_staggered::numerical::max_abs;
use simple_staggered::solver::{CaseConfig, SimpleSolver, SolveStatus};

const USAGE: &str = "usage: simple-staggered [channel | cavity | <case.json>] [output.json]";

fn load_case(arg: Option<&str>) -> Result<CaseConfig, Box<dyn std::error::Error>> {
    let case = match arg {
        None | Some("channel") => CaseConfig::default(),
        Some("cavity") => CaseConfig {
            fluid: Fluid { rho: 1.0, mu: 0.1 },
            boundaries: Boundaries2D::lid_driven_cavity(1.0),
            ..CaseConfig::default()
        },
        Some("-h") | Some("--help") => return Err(USAGE.into()),
        Some(path) => CaseConfig::from_json_file(Path::new(path))?,
    };
    Ok(case)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let case = load_case(args.first().map(String::as_str))?;
    let output = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output/solution.json"));

    let grid = case.build_grid()?;
    let fluid = grid.fluid();
    info!(
        "Case: {}x{} nodes, rho={}, mu={}, boundaries={:?}",
        case.dimensions.0, case.dimensions.1, fluid.rho, fluid.mu, case.boundaries
    );

    let mut solver = SimpleSolver::new(grid, case.solver)?;
    let report = solver.run()?;
    match report.status {
        SolveStatus::Converged => info!("Solution converged in {} iterations", report.iterations),
        SolveStatus::NonConvergence(reason) => warn!(
            "No convergence after {} iterations ({:?}), final residuals {:?}",
            report.iterations, reason, report.residuals
        ),
    }

    let speed = speed_at_cell_centres(solver.grid().u(), solver.grid().v());
    info!("Peak cell-centre speed: {:.4}", max_abs(&speed));

    let snapshot = Snapshot::capture(solver.grid(), report.iterations);
    write_snapshot(&snapshot, &output)?;
    Ok(())
}
