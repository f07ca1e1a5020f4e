use clap::Parser;
use log::{error, info};

use polyvem::{
    config::load_run_config, mesher::read_mesh, post_processor::csv_output, Conditions, Problem,
    Result, SolverMethod,
};

#[derive(Parser)]
#[command(name = "polyvem")]
#[command(about = "Virtual element solver for 2D linear elasticity on polygon meshes")]
#[command(version)]
struct Cli {
    /// Mesh description file
    mesh: String,
    /// JSON run configuration
    config: String,
    /// Displacement csv output
    #[arg(short, long, default_value = "displacements.csv")]
    output: String,
    /// Element stress csv output
    #[arg(short, long)]
    stress: Option<String>,
    /// Solver back-end, overrides the configuration
    #[arg(short, long)]
    method: Option<String>,
}

fn run(cli: &Cli) -> Result<()> {
    let (mesh, constraints) = read_mesh(&cli.mesh)?;
    let mut run_config = load_run_config(&cli.config)?;
    if let Some(method) = &cli.method {
        run_config.solver.method = method.parse::<SolverMethod>()?;
    }

    let conditions = Conditions::new(run_config.material)
        .with_body_force(run_config.body_force)
        .with_constraints(constraints);

    let mut problem = Problem::new(mesh, conditions, run_config.solver)?;
    let solution = problem.simulate()?;
    if !solution.conflicts.is_empty() {
        info!(
            "{} constraint conflicts were resolved by precedence",
            solution.conflicts.len()
        );
    }

    let stresses = problem.element_stresses(&solution)?;
    csv_output(
        &problem.mesh().points,
        &solution.displacements,
        &stresses,
        &cli.output,
        cli.stress.as_deref(),
        &run_config.output,
    )
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        error!("{err}");
        std::process::exit(1);
    }
}
