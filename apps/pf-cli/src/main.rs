use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod scenario;

use scenario::{CliResult, Report, Scenario, StateRecord};

#[derive(Parser)]
#[command(name = "pf-cli")]
#[command(about = "PropFlow CLI - numerical orbit propagation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a scenario file and its initial state
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Propagate a scenario and print the sampled ephemeris
    Propagate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Sampling interval in seconds (overrides the scenario)
        #[arg(long)]
        step: Option<f64>,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Propagate {
            scenario_path,
            json,
            step,
        } => cmd_propagate(&scenario_path, json, step),
    }
}

fn cmd_validate(scenario_path: &Path) -> CliResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = Scenario::load(scenario_path)?;
    let initial = scenario.validate()?;
    let orbit = initial.orbit();
    println!("✓ Scenario is valid");
    println!("  Epoch:    {}", initial.date());
    println!("  End:      {}", scenario.end_date());
    println!("  Mass:     {:.3} kg", initial.mass());
    match orbit.keplerian() {
        Ok(elements) => {
            println!("  a:        {:.3} m", elements.a);
            println!("  e:        {:.6}", elements.e);
            println!("  i:        {:.6} rad", elements.i);
        }
        Err(e) => println!("  Keplerian elements unavailable: {}", e),
    }
    Ok(())
}

fn cmd_propagate(scenario_path: &Path, json: bool, step: Option<f64>) -> CliResult<()> {
    let mut scenario = Scenario::load(scenario_path)?;
    if let Some(step) = step {
        scenario.output_step = step;
    }
    let report = scenario::run(&scenario)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }
    Ok(())
}

fn print_table(report: &Report) {
    println!(
        "{:>10}  {:>15} {:>15} {:>15}  {:>11} {:>11} {:>11}",
        "t [s]", "x [m]", "y [m]", "z [m]", "vx [m/s]", "vy [m/s]", "vz [m/s]"
    );
    for record in &report.samples {
        print_row(record);
    }
    println!("\nFinal state ({}):", report.final_state.date);
    print_row(&report.final_state);
    if let Some(det) = report.final_state.stm_determinant {
        println!("  det(STM) = {:.12}", det);
    }
    println!("\nIntegrator: {}", report.integrator);
    println!("  Steps:       {}", report.steps);
    println!("  Evaluations: {}", report.evaluations);
}

fn print_row(record: &StateRecord) {
    let [x, y, z] = record.position;
    let [vx, vy, vz] = record.velocity;
    println!(
        "{:>10.3}  {:>15.3} {:>15.3} {:>15.3}  {:>11.6} {:>11.6} {:>11.6}",
        record.elapsed, x, y, z, vx, vy, vz
    );
}
