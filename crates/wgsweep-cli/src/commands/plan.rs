//! `wgsweep plan`: validate the declaration and list what a run would do.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use wgsweep_core::{ExperimentRegistry, ProcessLauncher, SweepExecutor};

use crate::config::CliConfig;
use crate::output::OutputFormat;

/// Plan command arguments
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Only list experiments whose label contains this text (repeatable)
    #[arg(short, long, value_name = "TEXT")]
    pub filter: Vec<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,
}

/// One planned experiment.
#[derive(Debug, Serialize)]
pub struct PlannedExperiment {
    pub label: String,
    pub device: Option<String>,
    pub points: usize,
    pub first_command: Vec<String>,
}

impl PlanCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let registry = ExperimentRegistry::from_declaration(&config.sweep)
            .context("Invalid sweep declaration")?
            .filtered(&self.filter);
        let executor = SweepExecutor::from_settings(ProcessLauncher::new(), &config.sweep.run)
            .context("Invalid run settings")?;

        let planned: Vec<PlannedExperiment> = registry
            .iter()
            .map(|spec| PlannedExperiment {
                label: spec.label.clone(),
                device: spec.device.as_ref().map(ToString::to_string),
                points: spec.grid.len(),
                first_command: spec
                    .grid
                    .points()
                    .next()
                    .map(|point| executor.command_line(spec, &point))
                    .unwrap_or_default(),
            })
            .collect();

        let mut stdout = io::stdout().lock();
        match self.format {
            OutputFormat::Json => {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&planned)?)?;
            }
            OutputFormat::Text => {
                for entry in &planned {
                    writeln!(
                        stdout,
                        "{}  {} points  {}",
                        style(&entry.label).bold(),
                        entry.points,
                        entry.device.as_deref().unwrap_or("-"),
                    )?;
                    writeln!(stdout, "    {}", entry.first_command.join(" "))?;
                }
                writeln!(
                    stdout,
                    "\n{} {} experiments, {} invocations, timeout {}s each",
                    style("Plan:").bold(),
                    registry.len(),
                    registry.total_points(),
                    executor.invocation_timeout().as_secs(),
                )?;
            }
        }
        Ok(())
    }
}
