//! Human-facing rendering of sweep results and reports.
//!
//! Everything here writes to a caller-supplied [`Write`] so commands can
//! target stdout and tests can target a buffer. Styling goes through
//! `console`, which drops ANSI codes when the target is not a terminal.

use std::io::{self, Write};

use console::style;
use serde::Serialize;
use wgsweep_core::{ConfigurationPoint, ExperimentResult, ExperimentSummary, Report};

/// Output format for report listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text (default).
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}'. Expected one of: text, json")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// One row of a ranked report listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub label: String,
    pub best_point: ConfigurationPoint,
    pub best_seconds: f64,
    pub worst_seconds: f64,
    pub points_timed: usize,
    pub attempted: usize,
    pub failed: usize,
}

impl RankedEntry {
    fn new(rank: usize, label: &str, summary: &ExperimentSummary) -> Self {
        Self {
            rank,
            label: label.to_string(),
            best_point: summary.best.point,
            best_seconds: summary.best.seconds,
            worst_seconds: summary.worst.seconds,
            points_timed: summary.timings.len(),
            attempted: summary.attempted,
            failed: summary.failed,
        }
    }
}

/// Experiments ranked fastest first, optionally truncated to `top`.
pub fn ranked_entries(report: &Report, top: Option<usize>) -> Vec<RankedEntry> {
    report
        .ranked()
        .into_iter()
        .take(top.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, (label, summary))| RankedEntry::new(i + 1, label, summary))
        .collect()
}

/// Seconds with a unit that keeps three significant-looking digits.
pub fn format_seconds(seconds: f64) -> String {
    if seconds >= 1.0 {
        format!("{seconds:.3} s")
    } else if seconds >= 1e-3 {
        format!("{:.3} ms", seconds * 1e3)
    } else {
        format!("{:.1} µs", seconds * 1e6)
    }
}

pub fn write_ranked(out: &mut impl Write, entries: &[RankedEntry]) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "{}", style("Report contains no experiments").yellow());
    }
    let width = entries.iter().map(|e| e.label.len()).max().unwrap_or(0);
    for entry in entries {
        writeln!(
            out,
            "{:>3}. {:<width$}  {:>12}  at ({})  {}/{} timed",
            entry.rank,
            entry.label,
            format_seconds(entry.best_seconds),
            entry.best_point,
            entry.points_timed,
            entry.attempted,
        )?;
    }
    Ok(())
}

/// Best point per experiment, in registry order, after a sweep.
pub fn write_run_summary(out: &mut impl Write, results: &[ExperimentResult]) -> io::Result<()> {
    writeln!(out, "\n{}", style("Sweep Results").bold().cyan())?;
    writeln!(out, "=============")?;
    let width = results.iter().map(|r| r.label.len()).max().unwrap_or(0);
    for result in results {
        match result.best {
            Some(best) => writeln!(
                out,
                "  {} {:<width$}  {:>12}  at ({})  {} failed of {}",
                style("✓").green(),
                result.label,
                format_seconds(best.seconds),
                best.point,
                result.failed,
                result.attempted,
            )?,
            None => writeln!(
                out,
                "  {} {:<width$}  {}",
                style("✗").red(),
                result.label,
                style(format!("no usable timings ({} attempted)", result.attempted)).yellow(),
            )?,
        }
    }

    let with_data = results.iter().filter(|r| r.has_data).count();
    let attempted: usize = results.iter().map(|r| r.attempted).sum();
    let failed: usize = results.iter().map(|r| r.failed).sum();
    writeln!(out)?;
    writeln!(
        out,
        "{} {with_data}/{} experiments with data, {failed}/{attempted} invocations failed",
        style("Summary:").bold(),
        results.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgsweep_core::{InvocationFailure, InvocationResult, aggregate, export};

    fn sample() -> Vec<ExperimentResult> {
        let p = ConfigurationPoint::new;
        vec![
            aggregate(
                "Local A (GPU)[0]",
                &[
                    InvocationResult::success(p(1, 4, 1), 0.5),
                    InvocationResult::failure(p(2, 4, 1), InvocationFailure::UnparsableTiming),
                ],
            ),
            aggregate("Fast (GPU)[1]", &[InvocationResult::success(p(8, 8, 1), 0.002)]),
            aggregate(
                "Broken (CPU)[0]",
                &[InvocationResult::failure(p(1, 1, 1), InvocationFailure::TimedOut {
                    after: std::time::Duration::from_secs(1),
                })],
            ),
        ]
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_format_seconds_units() {
        assert_eq!(format_seconds(2.5), "2.500 s");
        assert_eq!(format_seconds(0.0125), "12.500 ms");
        assert_eq!(format_seconds(0.0000425), "42.5 µs");
    }

    #[test]
    fn test_ranked_entries_fastest_first_with_top() {
        let report = export(&sample());
        let entries = ranked_entries(&report, Some(1));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "Fast (GPU)[1]");
        assert_eq!(entries[0].rank, 1);

        let all = ranked_entries(&report, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].label, "Local A (GPU)[0]");
        assert_eq!(all[1].failed, 1);
    }

    #[test]
    fn test_run_summary_mentions_every_experiment() {
        let mut buf = Vec::new();
        write_run_summary(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Local A (GPU)[0]"));
        assert!(text.contains("at (1,4,1)"));
        assert!(text.contains("Broken (CPU)[0]"));
        assert!(text.contains("no usable timings"));
        assert!(text.contains("2/3 experiments with data"));
    }

    #[test]
    fn test_write_ranked_empty() {
        let mut buf = Vec::new();
        write_ranked(&mut buf, &[]).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("no experiments"));
    }
}
