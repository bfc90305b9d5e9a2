//! Run settings: per-invocation timeout, argument encoding, timing format,
//! report destination and scheduling.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::{ConfigurationPoint, GRID_DIMS};
use crate::timing::TimingFormat;

/// Upper bound on a single invocation when nothing else is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Report path when nothing else is configured.
pub const DEFAULT_OUTPUT: &str = "benchmark.json";

/// How a configuration point is appended to an experiment's base command.
///
/// In TOML: `encoding = "positional"` or
/// `encoding = { flagged = ["--local0", "--local1", "--local2"] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointEncoding {
    /// `v0 v1 v2`
    Positional,
    /// `<flag0> v0 <flag1> v1 <flag2> v2`
    Flagged([String; GRID_DIMS]),
}

impl Default for PointEncoding {
    fn default() -> Self {
        Self::Flagged(["--local0".to_string(), "--local1".to_string(), "--local2".to_string()])
    }
}

impl PointEncoding {
    pub fn encode(&self, point: &ConfigurationPoint) -> Vec<String> {
        let values = point.values().map(|v| v.to_string());
        match self {
            Self::Positional => values.to_vec(),
            Self::Flagged(flags) => flags
                .iter()
                .zip(values)
                .flat_map(|(flag, value)| [flag.clone(), value])
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub output: PathBuf,
    pub timeout_secs: u64,
    pub parallel_devices: bool,
    pub encoding: PointEncoding,
    pub timing: TimingFormat,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            parallel_devices: false,
            encoding: PointEncoding::default(),
            timing: TimingFormat::default(),
        }
    }
}

impl RunSettings {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }
}
