//! `wgsweep merge`: combine reports from separate runs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tracing::info;
use wgsweep_core::{Report, read_report, write_report};

/// Merge command arguments
#[derive(Args, Debug)]
pub struct MergeCommand {
    /// Merged report path
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Reports to merge; later ones win on duplicate labels
    #[arg(value_name = "REPORT", required = true)]
    pub inputs: Vec<PathBuf>,
}

impl MergeCommand {
    pub fn execute(&self) -> Result<()> {
        let mut merged = Report::new();
        for input in &self.inputs {
            let report = read_report(input)
                .with_context(|| format!("Failed to load report {}", input.display()))?;
            let replaced = merged.merge(report);
            info!(input = %input.display(), replaced = replaced.len(), "merged report");
        }

        write_report(&self.output, &merged)
            .with_context(|| format!("Failed to write report to {}", self.output.display()))?;
        println!(
            "{} Merged {} reports into {} ({} experiments)",
            style("✓").green(),
            self.inputs.len(),
            self.output.display(),
            merged.len()
        );
        Ok(())
    }
}
