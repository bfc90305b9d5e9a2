//! `wgsweep show`: rank a written report by best timing.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use wgsweep_core::read_report;

use crate::output::{OutputFormat, ranked_entries, write_ranked};

/// Show command arguments
#[derive(Args, Debug)]
pub struct ShowCommand {
    /// Report to read
    #[arg(value_name = "REPORT")]
    pub report: PathBuf,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Only the N fastest experiments
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,
}

impl ShowCommand {
    pub fn execute(&self) -> Result<()> {
        let report = read_report(&self.report)
            .with_context(|| format!("Failed to load report {}", self.report.display()))?;
        let entries = ranked_entries(&report, self.top);

        let mut stdout = io::stdout().lock();
        match self.format {
            OutputFormat::Json => writeln!(stdout, "{}", serde_json::to_string_pretty(&entries)?)?,
            OutputFormat::Text => write_ranked(&mut stdout, &entries)?,
        }
        Ok(())
    }
}
