//! Declarative sweep table, as read from a TOML file.
//!
//! The table lists device kinds with their indices, benchmark programs, a
//! default grid with per-program overrides, and fully explicit special-case
//! entries. [`crate::ExperimentRegistry::from_declaration`] expands and
//! validates it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::GRID_DIMS;
use crate::settings::RunSettings;

/// Raw axis values for all three dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridDeclaration {
    pub local0: Vec<u32>,
    pub local1: Vec<u32>,
    pub local2: Vec<u32>,
}

impl Default for GridDeclaration {
    fn default() -> Self {
        let sweep: Vec<u32> = (0..10).map(|shift| 1u32 << shift).collect();
        Self { local0: sweep.clone(), local1: sweep, local2: vec![1] }
    }
}

impl GridDeclaration {
    pub fn single_point() -> Self {
        Self { local0: vec![1], local1: vec![1], local2: vec![1] }
    }

    pub fn into_values(self) -> [Vec<u32>; GRID_DIMS] {
        [self.local0, self.local1, self.local2]
    }
}

/// Per-experiment replacement of individual axes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridOverride {
    pub local0: Option<Vec<u32>>,
    pub local1: Option<Vec<u32>>,
    pub local2: Option<Vec<u32>>,
}

impl GridOverride {
    /// Resolve against `base`; `degenerate` wins over any axis override.
    pub fn resolve(&self, base: &GridDeclaration, degenerate: bool) -> GridDeclaration {
        if degenerate {
            return GridDeclaration::single_point();
        }
        GridDeclaration {
            local0: self.local0.clone().unwrap_or_else(|| base.local0.clone()),
            local1: self.local1.clone().unwrap_or_else(|| base.local1.clone()),
            local2: self.local2.clone().unwrap_or_else(|| base.local2.clone()),
        }
    }
}

/// A device kind (`cpu`, `gpu`, ...) and the indices to sweep on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceGroup {
    pub kind: String,
    pub indices: Vec<u32>,
}

/// A benchmark program expanded across every declared device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentEntry {
    pub name: String,
    pub executable: PathBuf,
    #[serde(default)]
    pub degenerate: bool,
    #[serde(default)]
    pub grid: GridOverride,
    /// Restrict to these device kinds; all declared kinds when absent.
    #[serde(default)]
    pub devices: Option<Vec<String>>,
}

/// A fully spelled-out experiment that bypasses device expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplicitEntry {
    pub label: String,
    pub command: Vec<String>,
    /// Device kind used only for scheduling.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub device_index: Option<u32>,
    #[serde(default)]
    pub degenerate: bool,
    #[serde(default)]
    pub grid: GridOverride,
}

/// The complete sweep declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepDeclaration {
    /// Directory relative executables resolve against.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub grid: GridDeclaration,
    #[serde(default)]
    pub devices: Vec<DeviceGroup>,
    #[serde(default)]
    pub experiments: Vec<ExperimentEntry>,
    #[serde(default)]
    pub explicit: Vec<ExplicitEntry>,
    #[serde(default)]
    pub run: RunSettings,
}

impl SweepDeclaration {
    pub fn from_toml_str(source: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(source)
            .map_err(|source| ConfigError::Parse { path: origin.to_path_buf(), source })
    }

    /// Load from disk. A missing `base_dir` defaults to the file's directory
    /// and a relative one is taken relative to it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut declaration = Self::from_toml_str(&source, path)?;
        declaration.anchor_to(path);
        Ok(declaration)
    }

    /// Make `base_dir` relative to the file the declaration was read from.
    pub fn anchor_to(&mut self, origin: &Path) {
        let file_dir = origin.parent().map(Path::to_path_buf).unwrap_or_default();
        self.base_dir = Some(match self.base_dir.take() {
            Some(dir) if dir.is_relative() => file_dir.join(dir),
            Some(dir) => dir,
            None => file_dir,
        });
    }

    /// Total experiments after device expansion, before validation.
    pub fn expanded_len(&self) -> usize {
        let per_kind: Vec<(&str, usize)> =
            self.devices.iter().map(|d| (d.kind.as_str(), d.indices.len())).collect();
        let expanded: usize = self
            .experiments
            .iter()
            .map(|entry| {
                per_kind
                    .iter()
                    .filter(|(kind, _)| {
                        entry.devices.as_ref().is_none_or(|only| only.iter().any(|k| k == kind))
                    })
                    .map(|(_, n)| n)
                    .sum::<usize>()
            })
            .sum();
        expanded + self.explicit.len()
    }
}
