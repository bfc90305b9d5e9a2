//! The sweep report: experiment label → summary, serialized as JSON.
//!
//! ```json
//! {
//!   "Local A (GPU)[0]": {
//!     "timings": { "1,4,1": 0.5, "2,4,1": 0.75 },
//!     "best": { "point": [1, 4, 1], "seconds": 0.5 },
//!     "worst": { "point": [2, 4, 1], "seconds": 0.75 },
//!     "attempted": 3,
//!     "failed": 1
//!   }
//! }
//! ```
//!
//! Keys keep insertion order in both directions. Only experiments that
//! produced at least one timing appear.

use std::fmt;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{ExperimentResult, Measurement};
use crate::error::{ExportError, ReportReadError};
use crate::grid::ConfigurationPoint;

/// Exported form of an [`ExperimentResult`] that has data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    #[serde(with = "ordered_map")]
    pub timings: Vec<(ConfigurationPoint, f64)>,
    pub best: Measurement,
    pub worst: Measurement,
    pub attempted: usize,
    pub failed: usize,
}

impl ExperimentSummary {
    /// `None` when the experiment produced no timing.
    pub fn from_result(result: &ExperimentResult) -> Option<Self> {
        if !result.has_data {
            return None;
        }
        Some(Self {
            timings: result.timings.clone(),
            best: result.best?,
            worst: result.worst?,
            attempted: result.attempted,
            failed: result.failed,
        })
    }
}

/// Ordered mapping from experiment label to summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Report {
    #[serde(with = "ordered_map")]
    entries: Vec<(String, ExperimentSummary)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its position and the old
    /// summary is returned.
    pub fn insert(
        &mut self,
        label: impl Into<String>,
        summary: ExperimentSummary,
    ) -> Option<ExperimentSummary> {
        let label = label.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, slot)) => Some(std::mem::replace(slot, summary)),
            None => {
                self.entries.push((label, summary));
                None
            }
        }
    }

    /// Fold `other` into `self`; its entries win. Returns the replaced labels.
    pub fn merge(&mut self, other: Report) -> Vec<String> {
        let mut replaced = Vec::new();
        for (label, summary) in other.entries {
            if self.insert(label.clone(), summary).is_some() {
                warn!(%label, "merged report overrides existing entry");
                replaced.push(label);
            }
        }
        replaced
    }

    pub fn get(&self, label: &str) -> Option<&ExperimentSummary> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, s)| s)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExperimentSummary)> {
        self.entries.iter().map(|(l, s)| (l.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by best time, fastest first. Ties keep report order.
    pub fn ranked(&self) -> Vec<(&str, &ExperimentSummary)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| a.1.best.seconds.total_cmp(&b.1.best.seconds));
        ranked
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }
}

/// Build the report from every experiment's result, dropping those without data.
pub fn export<'a>(results: impl IntoIterator<Item = &'a ExperimentResult>) -> Report {
    let mut report = Report::new();
    for result in results {
        match ExperimentSummary::from_result(result) {
            Some(summary) => {
                if report.insert(result.label.clone(), summary).is_some() {
                    warn!(label = %result.label, "duplicate label in export, keeping later result");
                }
            }
            None => info!(
                label = %result.label,
                attempted = result.attempted,
                "no usable timings, omitted from report"
            ),
        }
    }
    report
}

/// Write the report to `path`.
///
/// The document is fully serialized first, written to a temporary file next
/// to `path`, then renamed over it, so readers never see a partial report.
pub fn write_report(path: &Path, report: &Report) -> Result<(), ExportError> {
    let json = report.to_json_pretty()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let write_err = |source| ExportError::Write { path: path.to_path_buf(), source };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    set_report_permissions(tmp.as_file()).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!(path = %path.display(), experiments = report.len(), "report written");
    Ok(())
}

/// Temp files are created 0600; a report is an ordinary 0644 file.
#[cfg(unix)]
fn set_report_permissions(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_report_permissions(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}

pub fn read_report(path: &Path) -> Result<Report, ReportReadError> {
    let source = fs::read_to_string(path)
        .map_err(|source| ReportReadError::Io { path: path.to_path_buf(), source })?;
    Report::from_json(&source)
        .map_err(|source| ReportReadError::Malformed { path: path.to_path_buf(), source })
}

/// `Vec<(K, V)>` as a JSON object, keeping order. Keys go through
/// `Display` / `FromStr`.
mod ordered_map {
    use super::*;

    pub fn serialize<S, K, V>(pairs: &[(K, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: fmt::Display,
        V: Serialize,
    {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (key, value) in pairs {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<Vec<(K, V)>, D::Error>
    where
        D: Deserializer<'de>,
        K: FromStr,
        K::Err: fmt::Display,
        V: Deserialize<'de>,
    {
        deserializer.deserialize_map(PairsVisitor(PhantomData))
    }

    struct PairsVisitor<K, V>(PhantomData<(K, V)>);

    impl<'de, K, V> Visitor<'de> for PairsVisitor<K, V>
    where
        K: FromStr,
        K::Err: fmt::Display,
        V: Deserialize<'de>,
    {
        type Value = Vec<(K, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                let key = key.parse().map_err(<A::Error as serde::de::Error>::custom)?;
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }
}
