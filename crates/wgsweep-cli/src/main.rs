//! wgsweep CLI application
//!
//! Sweeps OpenCL-style benchmark programs across a grid of work-group sizes,
//! one process per configuration, and collects the timings into a JSON report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use wgsweep_cli::commands::{MergeCommand, PlanCommand, RunCommand, ShowCommand};
use wgsweep_cli::config::{CliConfig, ConfigBuilder, DEFAULT_CONFIG_FILE, LogFormat};
use wgsweep_cli::exit::{EXIT_CONFIG_FAIL, exit_code_for};

/// wgsweep - work-group size benchmark sweeps
#[derive(Parser)]
#[command(name = "wgsweep")]
#[command(about = "Sweep benchmark programs across work-group sizes")]
#[command(long_about = r#"
wgsweep runs each benchmark program once per point of a three-axis
work-group size grid, on every declared device, and records the runtime each
run prints. Failing configurations are logged and skipped; the best point per
experiment ends up in a JSON report.

Examples:
  # List what would run
  wgsweep plan --config sweep.toml

  # Full sweep, one device at a time
  wgsweep run --config sweep.toml --output benchmark.json

  # Devices in parallel, only GPU experiments
  wgsweep run --config sweep.toml --parallel-devices --filter GPU

  # Fastest ten experiments of a report
  wgsweep show benchmark.json --top 10

  # Combine runs from different machines
  wgsweep merge --output all.json host-a.json host-b.json
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path (default: wgsweep.toml)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep every experiment and write the report
    Run(RunCommand),

    /// Validate the declaration and list planned invocations
    Plan(PlanCommand),

    /// Rank the experiments of a report
    Show(ShowCommand),

    /// Merge reports, later files winning
    Merge(MergeCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = match load_configuration(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(EXIT_CONFIG_FAIL);
        }
    };

    setup_logging(&config);
    match &source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("Using default configuration"),
    }

    let result = match &cli.command {
        Commands::Run(cmd) => cmd.execute(&config),
        Commands::Plan(cmd) => cmd.execute(&config),
        Commands::Show(cmd) => cmd.execute(),
        Commands::Merge(cmd) => cmd.execute(),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);

        let mut source = e.source();
        while let Some(err) = source {
            error!("  Caused by: {}", err);
            source = err.source();
        }

        std::process::exit(exit_code_for(&e));
    }

    Ok(())
}

/// Layer defaults, the config file, the environment and flags.
///
/// An explicit `--config` must exist; the default file is optional.
fn load_configuration(cli: &Cli) -> Result<(CliConfig, Option<PathBuf>)> {
    let (builder, source) = match &cli.config {
        Some(path) => (ConfigBuilder::from_file(path)?, Some(path.clone())),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if path.exists() {
                (ConfigBuilder::from_file(&path)?, Some(path))
            } else {
                (ConfigBuilder::new(), None)
            }
        }
    };

    let mut builder = builder
        .from_env()
        .context("Invalid environment override")?
        .log_level(cli.log_level.clone())
        .log_format(cli.log_format);
    if let Commands::Run(cmd) = &cli.command {
        builder = cmd.apply_overrides(builder);
    }

    let config = builder.build().context("Failed to build configuration")?;
    Ok((config, source))
}

/// Logs go to stderr; stdout carries reports and summaries.
fn setup_logging(config: &CliConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => {
            subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).init();
        }
        LogFormat::Compact => {
            subscriber.compact().init();
        }
        LogFormat::Pretty => {
            subscriber.pretty().init();
        }
    }
}
