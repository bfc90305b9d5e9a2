//! The set of experiments to sweep.
//!
//! Construction is where every configuration check happens: grids, label
//! uniqueness, and that each program exists and is executable. Once a
//! [`ExperimentRegistry`] exists, running it can only fail per point.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::declaration::{ExperimentEntry, ExplicitEntry, GridDeclaration, SweepDeclaration};
use crate::error::ConfigError;
use crate::grid::Grid;

/// Opaque device selection, passed through to the program's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceSelector {
    pub kind: String,
    pub index: Option<u32>,
}

impl DeviceSelector {
    pub fn new(kind: impl Into<String>, index: Option<u32>) -> Self {
        Self { kind: kind.into(), index }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{index}]", self.kind),
            None => f.write_str(&self.kind),
        }
    }
}

/// One program bound to a device and a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentSpec {
    /// Report key; unique within a registry.
    pub label: String,
    /// Program path followed by its fixed arguments.
    pub base_command: Vec<String>,
    pub grid: Grid,
    /// Device used for scheduling; `None` when unknown.
    pub device: Option<DeviceSelector>,
}

impl ExperimentSpec {
    pub fn new(label: impl Into<String>, base_command: Vec<String>, grid: Grid) -> Self {
        Self { label: label.into(), base_command, grid, device: None }
    }

    pub fn with_device(mut self, device: DeviceSelector) -> Self {
        self.device = Some(device);
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.base_command.first().map(String::as_str)
    }
}

/// Label for an experiment expanded onto a device, e.g. `Local A (GPU)[1]`.
pub fn expanded_label(name: &str, kind: &str, index: u32) -> String {
    format!("{name} ({})[{index}]", kind.to_uppercase())
}

/// Validated, ordered experiment set.
#[derive(Debug, Clone, Default)]
pub struct ExperimentRegistry {
    specs: Vec<ExperimentSpec>,
}

impl ExperimentRegistry {
    /// Validate hand-built specs. Programs named without a path separator
    /// are looked up on `PATH`.
    pub fn from_specs(specs: Vec<ExperimentSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(specs.len());
        let mut checked = Vec::with_capacity(specs.len());
        for mut spec in specs {
            if !seen.insert(spec.label.clone()) {
                return Err(ConfigError::DuplicateLabel(spec.label));
            }
            let program = spec
                .program()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ConfigError::EmptyCommand(spec.label.clone()))?;
            let resolved = resolve_program(&spec.label, Path::new(program), None)?;
            spec.base_command[0] = resolved.to_string_lossy().into_owned();
            checked.push(spec);
        }
        Ok(Self { specs: checked })
    }

    /// Expand and validate a declaration.
    ///
    /// Order: experiments as declared, each across device kinds as declared
    /// and indices as listed; explicit entries last.
    pub fn from_declaration(declaration: &SweepDeclaration) -> Result<Self, ConfigError> {
        let base_dir = declaration.base_dir.as_deref();
        let mut kinds = HashSet::new();
        for group in &declaration.devices {
            if !kinds.insert(group.kind.as_str()) {
                return Err(ConfigError::DuplicateDeviceKind(group.kind.clone()));
            }
            if group.indices.is_empty() {
                return Err(ConfigError::NoDeviceIndices { kind: group.kind.clone() });
            }
        }

        let mut specs = Vec::with_capacity(declaration.expanded_len());
        for entry in &declaration.experiments {
            if let Some(only) = &entry.devices {
                if let Some(unknown) = only.iter().find(|k| !kinds.contains(k.as_str())) {
                    return Err(ConfigError::UnknownDeviceKind {
                        experiment: entry.name.clone(),
                        kind: unknown.clone(),
                    });
                }
            }
            let program = resolve_program(&entry.name, &entry.executable, base_dir)?;
            let grid = build_grid(&entry.name, entry, &declaration.grid)?;
            for group in declaration.devices.iter().filter(|g| entry_targets(entry, &g.kind)) {
                for &index in &group.indices {
                    let label = expanded_label(&entry.name, &group.kind, index);
                    let command = vec![
                        program.to_string_lossy().into_owned(),
                        format!("-{}", group.kind),
                        index.to_string(),
                    ];
                    specs.push(
                        ExperimentSpec::new(label, command, grid.clone())
                            .with_device(DeviceSelector::new(group.kind.clone(), Some(index))),
                    );
                }
            }
        }

        for entry in &declaration.explicit {
            specs.push(explicit_spec(entry, &declaration.grid, base_dir)?);
        }

        let mut seen = HashSet::with_capacity(specs.len());
        if let Some(dup) = specs.iter().find(|s| !seen.insert(s.label.as_str())) {
            return Err(ConfigError::DuplicateLabel(dup.label.clone()));
        }

        if specs.is_empty() {
            tracing::warn!("sweep declaration produced no experiments");
        }
        Ok(Self { specs })
    }

    /// Keep experiments whose label contains any of `needles`; all when empty.
    pub fn filtered(self, needles: &[String]) -> Self {
        if needles.is_empty() {
            return self;
        }
        let specs = self
            .specs
            .into_iter()
            .filter(|s| needles.iter().any(|n| s.label.contains(n.as_str())))
            .collect();
        Self { specs }
    }

    pub fn get(&self, label: &str) -> Option<&ExperimentSpec> {
        self.specs.iter().find(|s| s.label == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExperimentSpec> {
        self.specs.iter()
    }

    pub fn specs(&self) -> &[ExperimentSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Invocations a full sweep will issue.
    pub fn total_points(&self) -> usize {
        self.specs.iter().map(|s| s.grid.len()).sum()
    }
}

impl<'a> IntoIterator for &'a ExperimentRegistry {
    type Item = &'a ExperimentSpec;
    type IntoIter = std::slice::Iter<'a, ExperimentSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

fn entry_targets(entry: &ExperimentEntry, kind: &str) -> bool {
    entry.devices.as_ref().is_none_or(|only| only.iter().any(|k| k == kind))
}

fn build_grid(
    label: &str,
    entry: &ExperimentEntry,
    base: &GridDeclaration,
) -> Result<Grid, ConfigError> {
    let values = entry.grid.resolve(base, entry.degenerate).into_values();
    Grid::from_values(values)
        .map_err(|source| ConfigError::InvalidGrid { label: label.to_string(), source })
}

fn explicit_spec(
    entry: &ExplicitEntry,
    base: &GridDeclaration,
    base_dir: Option<&Path>,
) -> Result<ExperimentSpec, ConfigError> {
    let (program, args) = entry
        .command
        .split_first()
        .filter(|(p, _)| !p.is_empty())
        .ok_or_else(|| ConfigError::EmptyCommand(entry.label.clone()))?;
    let program = resolve_program(&entry.label, Path::new(program), base_dir)?;
    let values = entry.grid.resolve(base, entry.degenerate).into_values();
    let grid = Grid::from_values(values)
        .map_err(|source| ConfigError::InvalidGrid { label: entry.label.clone(), source })?;

    let mut command = Vec::with_capacity(entry.command.len());
    command.push(program.to_string_lossy().into_owned());
    command.extend(args.iter().cloned());

    let spec = ExperimentSpec::new(entry.label.clone(), command, grid);
    Ok(match &entry.device {
        Some(kind) => spec.with_device(DeviceSelector::new(kind.clone(), entry.device_index)),
        None => spec,
    })
}

/// Resolve a program path and check it is an executable file.
///
/// Relative paths resolve against `base_dir` (or the working directory).
/// A bare name that does not exist there is looked up on `PATH`.
fn resolve_program(
    label: &str,
    program: &Path,
    base_dir: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    let candidate = match base_dir {
        Some(dir) if program.is_relative() => dir.join(program),
        _ => program.to_path_buf(),
    };
    let is_bare = program.components().count() == 1 && program.is_relative();

    let path = if candidate.exists() {
        candidate
    } else if is_bare {
        which_in_path(program).ok_or_else(|| ConfigError::MissingExecutable {
            label: label.to_string(),
            path: candidate.clone(),
        })?
    } else {
        return Err(ConfigError::MissingExecutable { label: label.to_string(), path: candidate });
    };

    if !is_executable(&path) {
        return Err(ConfigError::NotExecutable { label: label.to_string(), path });
    }
    // A relative path without a separator would be looked up on PATH at spawn.
    Ok(std::path::absolute(&path).unwrap_or(path))
}

/// `which`-style lookup of a bare program name on `$PATH`.
fn which_in_path(name: &Path) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| {
            let candidate = dir.join(name);
            is_executable(&candidate).then_some(candidate)
        })
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata().map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
