//! CLI configuration.
//!
//! One TOML file holds the sweep declaration (top-level `base_dir`, `[grid]`,
//! `[[devices]]`, `[[experiments]]`, `[[explicit]]`, `[run]`) plus a
//! `[logging]` section. Layering, lowest to highest: defaults, file,
//! `WGSWEEP_*` environment variables, command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wgsweep_core::{
    ConfigError, DeviceGroup, ExperimentEntry, ExplicitEntry, GridDeclaration, RunSettings,
    SweepDeclaration,
};

pub const ENV_OUTPUT: &str = "WGSWEEP_OUTPUT";
pub const ENV_TIMEOUT_SECS: &str = "WGSWEEP_TIMEOUT_SECS";
pub const ENV_PARALLEL_DEVICES: &str = "WGSWEEP_PARALLEL_DEVICES";
pub const ENV_LOG_LEVEL: &str = "WGSWEEP_LOG_LEVEL";

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "wgsweep.toml";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

/// Everything the CLI reads from its config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct CliConfig {
    #[serde(flatten)]
    pub sweep: SweepDeclaration,
    pub logging: LoggingConfig,
}

/// On-disk layout: the declaration's top-level keys plus `[logging]`.
/// Spelled out so a misspelled table is an error rather than ignored.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    base_dir: Option<PathBuf>,
    #[serde(default)]
    grid: GridDeclaration,
    #[serde(default)]
    devices: Vec<DeviceGroup>,
    #[serde(default)]
    experiments: Vec<ExperimentEntry>,
    #[serde(default)]
    explicit: Vec<ExplicitEntry>,
    #[serde(default)]
    run: RunSettings,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigFile> for CliConfig {
    fn from(file: ConfigFile) -> Self {
        Self {
            sweep: SweepDeclaration {
                base_dir: file.base_dir,
                grid: file.grid,
                devices: file.devices,
                experiments: file.experiments,
                explicit: file.explicit,
                run: file.run,
            },
            logging: file.logging,
        }
    }
}

/// Layered construction of a [`CliConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: CliConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a TOML file. Relative `base_dir` and executables resolve
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&source, path)
    }

    pub fn from_toml_str(source: &str, origin: &Path) -> Result<Self, ConfigError> {
        let mut config: CliConfig = toml::from_str(source)
            .map_err(|source| ConfigError::Parse { path: origin.to_path_buf(), source })?;
        config.sweep.anchor_to(origin);
        Ok(Self { config })
    }

    /// Apply `WGSWEEP_*` overrides. Unset or empty variables are ignored.
    pub fn from_env(mut self) -> Result<Self> {
        if let Some(output) = env_value(ENV_OUTPUT) {
            self.config.sweep.run.output = PathBuf::from(output);
        }

        if let Some(timeout) = env_value(ENV_TIMEOUT_SECS) {
            self.config.sweep.run.timeout_secs = timeout
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS}: invalid value `{timeout}`"))?;
        }

        if let Some(parallel) = env_value(ENV_PARALLEL_DEVICES) {
            self.config.sweep.run.parallel_devices = parse_bool(&parallel)
                .with_context(|| format!("{ENV_PARALLEL_DEVICES}: invalid value `{parallel}`"))?;
        }

        if let Some(level) = env_value(ENV_LOG_LEVEL) {
            self.config.logging.level = level;
        }

        Ok(self)
    }

    pub fn output(mut self, output: Option<PathBuf>) -> Self {
        if let Some(output) = output {
            self.config.sweep.run.output = output;
        }
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: Option<u64>) -> Self {
        if let Some(timeout_secs) = timeout_secs {
            self.config.sweep.run.timeout_secs = timeout_secs;
        }
        self
    }

    /// A set flag turns per-device parallelism on; an unset flag leaves the
    /// lower layers alone.
    pub fn parallel_devices(mut self, enabled: bool) -> Self {
        if enabled {
            self.config.sweep.run.parallel_devices = true;
        }
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        if let Some(level) = level {
            self.config.logging.level = level;
        }
        self
    }

    pub fn log_format(mut self, format: Option<LogFormat>) -> Self {
        if let Some(format) = format {
            self.config.logging.format = format;
        }
        self
    }

    /// Validate run settings and finish.
    pub fn build(self) -> Result<CliConfig, ConfigError> {
        self.config.sweep.run.timeout()?;
        Ok(self.config)
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true/false, got `{other}`"),
    }
}
