//! Reduction of one experiment's invocation results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::executor::InvocationResult;
use crate::grid::ConfigurationPoint;

/// A timed configuration point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub point: ConfigurationPoint,
    pub seconds: f64,
}

/// Per-experiment summary of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentResult {
    pub label: String,
    /// True iff `timings` is non-empty.
    pub has_data: bool,
    /// Successful points in enumeration order.
    pub timings: Vec<(ConfigurationPoint, f64)>,
    /// Fastest point; the earliest wins a tie.
    pub best: Option<Measurement>,
    /// Slowest point; the earliest wins a tie.
    pub worst: Option<Measurement>,
    pub attempted: usize,
    pub failed: usize,
}

impl ExperimentResult {
    pub fn timing(&self, point: &ConfigurationPoint) -> Option<f64> {
        self.timings.iter().find(|(p, _)| p == point).map(|&(_, seconds)| seconds)
    }
}

/// Fold invocation results into an [`ExperimentResult`].
///
/// Pure and infallible. Only successful results with a timing contribute; a
/// point seen twice keeps its first timing.
pub fn aggregate(label: impl Into<String>, results: &[InvocationResult]) -> ExperimentResult {
    let mut seen = HashSet::with_capacity(results.len());
    let mut timings = Vec::with_capacity(results.len());
    let mut best: Option<Measurement> = None;
    let mut worst: Option<Measurement> = None;

    for result in results {
        let Some(seconds) = result.timing_seconds.filter(|_| result.succeeded) else {
            continue;
        };
        if !seen.insert(result.point) {
            continue;
        }
        timings.push((result.point, seconds));

        let current = Measurement { point: result.point, seconds };
        if best.is_none_or(|b| seconds < b.seconds) {
            best = Some(current);
        }
        if worst.is_none_or(|w| seconds > w.seconds) {
            worst = Some(current);
        }
    }

    let failed = results.iter().filter(|r| !r.succeeded).count();
    ExperimentResult {
        label: label.into(),
        has_data: !timings.is_empty(),
        timings,
        best,
        worst,
        attempted: results.len(),
        failed,
    }
}
