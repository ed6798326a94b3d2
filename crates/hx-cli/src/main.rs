//! hubext CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use hx_inference::{DecompositionMethod, SamplingMode, WeightScheme};
use std::path::{Path, PathBuf};

mod pipeline;
mod report;
mod run;

use pipeline::{InputPaths, SimulationOptions, SmoothingOptions};

#[derive(Parser)]
#[command(name = "hubext")]
#[command(about = "hubext - airline hub concentration externalities by simulation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample coefficients, propagate effects and regress per airport hub
    Simulate {
        /// Airline-level market panel (CSV)
        #[arg(long)]
        airline: PathBuf,

        /// Airport-level panel with HHI and airport hub size (CSV)
        #[arg(long)]
        airport: PathBuf,

        /// Regression point estimates (CSV, one row, columns named by regressor)
        #[arg(long)]
        coefficients: PathBuf,

        /// Regression covariance (CSV, labelled rows and columns)
        #[arg(long)]
        covariance: PathBuf,

        /// Coefficient layout: hub (8 coefficients) or pooled (2)
        #[arg(long, default_value = "hub")]
        mode: SamplingMode,

        /// Number of coefficient draws
        #[arg(long, default_value = "1000")]
        num_sims: usize,

        /// RNG seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Covariance factorisation (cholesky, svd). Defaults per mode.
        #[arg(long)]
        method: Option<DecompositionMethod>,

        /// Regression weights (none, flights, market_share, market_share_x_flights)
        #[arg(long, default_value = "none")]
        weights: String,

        /// Print indented per-hub summary tables instead of JSON on stdout.
        #[arg(long)]
        table: bool,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "1")]
        threads: usize,
    },

    /// Externality at the point estimates: per-hub WLS lines and smoothers
    TrueEffect {
        /// Airline-level market panel (CSV)
        #[arg(long)]
        airline: PathBuf,

        /// Airport-level panel with HHI and airport hub size (CSV)
        #[arg(long)]
        airport: PathBuf,

        /// Regression point estimates (CSV)
        #[arg(long)]
        coefficients: PathBuf,

        /// Coefficient layout: hub (8 coefficients) or pooled (2)
        #[arg(long, default_value = "hub")]
        mode: SamplingMode,

        /// WLS weights (flights, market_share, market_share_x_flights)
        #[arg(long, default_value = "market_share_x_flights")]
        weights: WeightScheme,

        /// Gaussian kernel bandwidth (market-share units)
        #[arg(long, default_value = "0.05")]
        bandwidth: f64,

        /// Grid points of the effect smoother
        #[arg(long, default_value = "100")]
        n_grid: usize,

        /// Lower grid bound of the market-share densities
        #[arg(long, default_value = "0.0")]
        density_min: f64,

        /// Upper grid bound of the market-share densities
        #[arg(long, default_value = "1.0")]
        density_max: f64,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full analysis from a run config (YAML, or JSON by extension)
    Run {
        /// Run config path
        #[arg(long)]
        config: PathBuf,
    },

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            airline,
            airport,
            coefficients,
            covariance,
            mode,
            num_sims,
            seed,
            method,
            weights,
            table,
            output,
            threads,
        } => {
            let inputs = InputPaths { airline, airport, coefficients, covariance };
            let options = SimulationOptions {
                mode,
                num_sims,
                seed,
                method,
                weights: pipeline::parse_weights(&weights)?,
            };
            cmd_simulate(&inputs, &options, table, output.as_ref(), threads)
        }
        Commands::TrueEffect {
            airline,
            airport,
            coefficients,
            mode,
            weights,
            bandwidth,
            n_grid,
            density_min,
            density_max,
            output,
        } => {
            let smoothing = SmoothingOptions {
                bandwidth,
                n_grid,
                density_range: (density_min, density_max),
                ..SmoothingOptions::default()
            };
            cmd_true_effect(&airline, &airport, &coefficients, mode, weights, smoothing, output.as_ref())
        }
        Commands::Run { config } => {
            let written = run::run(&config)?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Version => {
            println!("hubext {}", hx_core::VERSION);
            Ok(())
        }
    }
}

fn cmd_simulate(
    inputs: &InputPaths,
    options: &SimulationOptions,
    table: bool,
    output: Option<&PathBuf>,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    let observations = pipeline::load_observations(&inputs.airline, &inputs.airport)?;
    let mu = pipeline::load_coefficients(&inputs.coefficients, options.mode)?;
    let sigma = pipeline::load_covariance(&inputs.covariance, options.mode)?;
    let sim = pipeline::simulate(&observations, &mu, &sigma, options)?;

    let value = report::simulation_json(&sim);
    if table {
        if let Some(path) = output {
            std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
        }
        print!("{}", report::summary_tables(&sim.regression.summaries()));
        print!("{}", report::dominance_table("P(slope row > slope column)", &sim.slope_dominance));
        return Ok(());
    }
    write_json(output, value)
}

fn cmd_true_effect(
    airline: &Path,
    airport: &Path,
    coefficients: &Path,
    mode: SamplingMode,
    weights: WeightScheme,
    smoothing: SmoothingOptions,
    output: Option<&PathBuf>,
) -> Result<()> {
    let observations = pipeline::load_observations(airline, airport)?;
    let mu = pipeline::load_coefficients(coefficients, mode)?;
    let truth = pipeline::true_effect(&observations, &mu, mode, weights, smoothing)?;

    let mut value = report::true_externality_json(&truth);
    value["smoothing"] = report::smoothing_json(&truth);
    write_json(output, value)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
