//! nmm CLI

mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use nmm_inference::{SimulationConfig, SimulationDriver, save_npz, write_summary_json};
use std::path::PathBuf;

const DEFAULT_OUTPUT: &str = "../results/mnn_mix_simulation.npz";

#[derive(Parser)]
#[command(name = "nmm")]
#[command(about = "nmm - Monte Carlo study of mixture-prior recovery in the normal-means problem")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Append log lines to this file instead of stdout (truncated at start)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Simulation config (JSON). Missing fields take the built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output archive (.npz)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Per-trial goodness-of-fit summary (pretty JSON)
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Override the number of trials
    #[arg(long)]
    n_sim: Option<usize>,

    /// Override the data-stream seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the effective config as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(n_sim) = cli.n_sim {
        config.n_sim = n_sim;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.log_level, cli.log_file.as_deref())
        .context("failed to open log file")?;

    let config = load_config(&cli)?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut driver = SimulationDriver::new(config).context("invalid simulation config")?;
    let result = driver.run().context("simulation failed")?;

    save_npz(&cli.output, &result)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    tracing::debug!(path = %cli.output.display(), shape = ?result.shape(), "results saved");

    if let Some(path) = &cli.summary {
        write_summary_json(path, &result.trials)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
