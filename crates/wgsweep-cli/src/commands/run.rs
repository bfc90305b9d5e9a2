//! `wgsweep run`: sweep every experiment and write the report.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use wgsweep_core::{
    ExperimentRegistry, ExperimentResult, ExperimentSpec, InvocationResult, ProcessLauncher,
    Report, Schedule, Sweep, SweepExecutor, SweepObserver, export, read_report, write_report,
};

use crate::config::{CliConfig, ConfigBuilder};
use crate::output::write_run_summary;

/// Run command arguments
#[derive(Args, Debug, Default)]
pub struct RunCommand {
    /// Report path (default: benchmark.json)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Per-invocation timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Run experiments on different devices concurrently
    #[arg(long)]
    pub parallel_devices: bool,

    /// Only run experiments whose label contains this text (repeatable)
    #[arg(short, long, value_name = "TEXT")]
    pub filter: Vec<String>,

    /// Merge into an existing report instead of replacing it
    #[arg(long)]
    pub merge: bool,

    /// No progress bar or summary
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunCommand {
    /// Fold this command's flags into the configuration layers.
    pub fn apply_overrides(&self, builder: ConfigBuilder) -> ConfigBuilder {
        builder
            .output(self.output.clone())
            .timeout_secs(self.timeout_secs)
            .parallel_devices(self.parallel_devices)
    }

    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let registry = ExperimentRegistry::from_declaration(&config.sweep)
            .context("Invalid sweep declaration")?
            .filtered(&self.filter);
        if registry.is_empty() && !self.filter.is_empty() {
            anyhow::bail!("No experiment label matches {:?}", self.filter);
        }

        let run = &config.sweep.run;
        let executor = SweepExecutor::from_settings(ProcessLauncher::new(), run)
            .context("Invalid run settings")?;
        let merge_target = self.load_merge_target(&run.output)?;
        let schedule = Schedule::from_parallel_flag(run.parallel_devices);
        info!(
            experiments = registry.len(),
            points = registry.total_points(),
            ?schedule,
            timeout_secs = run.timeout_secs,
            "starting sweep"
        );

        let progress = SweepProgress::new(registry.total_points(), self.quiet);
        let results = Sweep::new(&executor, schedule).run(&registry, &progress);
        progress.finish();

        let report = assemble_report(merge_target, &results);
        if let Err(e) = write_report(&run.output, &report) {
            dump_report(&report);
            return Err(e)
                .with_context(|| format!("Failed to write report to {}", run.output.display()));
        }
        info!(path = %run.output.display(), experiments = report.len(), "report written");

        if !self.quiet {
            let mut stdout = io::stdout().lock();
            write_run_summary(&mut stdout, &results)?;
            writeln!(stdout, "Report: {}", style(run.output.display()).bold())?;
        }
        Ok(())
    }

    /// With `--merge`, load the report already at `output` so a corrupt file
    /// is caught before anything runs. `None` when there is nothing to merge.
    fn load_merge_target(&self, output: &Path) -> Result<Option<Report>> {
        if !self.merge || !output.exists() {
            return Ok(None);
        }
        let existing = read_report(output)
            .with_context(|| format!("Cannot merge into {}", output.display()))?;
        info!(
            path = %output.display(),
            experiments = existing.len(),
            "merging into existing report"
        );
        Ok(Some(existing))
    }
}

fn assemble_report(merge_target: Option<Report>, results: &[ExperimentResult]) -> Report {
    let fresh = export(results);
    let Some(mut existing) = merge_target else {
        return fresh;
    };
    let replaced = existing.merge(fresh);
    info!(replaced = replaced.len(), total = existing.len(), "merged into existing report");
    existing
}

/// Last resort when the report cannot be written: put it on stdout.
fn dump_report(report: &Report) {
    match report.to_json_pretty() {
        Ok(json) => {
            warn!("report could not be written, dumping it to stdout");
            println!("{json}");
        }
        Err(e) => warn!(error = %e, "report could not be serialized"),
    }
}

/// Progress bar over every invocation of the sweep.
pub struct SweepProgress {
    bar: ProgressBar,
}

impl SweepProgress {
    pub fn new(total_points: usize, hidden: bool) -> Self {
        let bar = if hidden { ProgressBar::hidden() } else { ProgressBar::new(total_points as u64) };
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message(format!("{} Sweep completed", style("✓").green()));
    }
}

impl SweepObserver for SweepProgress {
    fn experiment_started(&self, spec: &ExperimentSpec) {
        self.bar.set_message(spec.label.clone());
    }

    fn point_finished(&self, _spec: &ExperimentSpec, _result: &InvocationResult) {
        self.bar.inc(1);
    }

    fn experiment_finished(&self, result: &ExperimentResult) {
        if !result.has_data {
            self.bar.println(format!(
                "{} {} produced no usable timings",
                style("⚠").yellow(),
                result.label
            ));
        }
    }
}
