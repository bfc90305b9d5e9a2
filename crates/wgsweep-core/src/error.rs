//! Error types for sweep declaration, registry construction and report I/O.
//!
//! Per-point invocation failures are not errors in this sense; they are
//! recorded on the result as [`crate::InvocationFailure`] and the sweep keeps
//! going.

use std::path::PathBuf;

use crate::grid::GridError;

// ── Configuration ────────────────────────────────────────────────────────────

/// Fatal configuration problems, raised before any process is spawned.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A grid axis of the named experiment is empty or malformed.
    #[error("experiment `{label}` has an invalid grid")]
    InvalidGrid {
        label: String,
        #[source]
        source: GridError,
    },

    /// Two experiments resolve to the same report key.
    #[error("duplicate experiment label `{0}`")]
    DuplicateLabel(String),

    /// The program path does not exist.
    #[error("executable for `{label}` not found: {}", path.display())]
    MissingExecutable { label: String, path: PathBuf },

    /// The program path exists but cannot be executed.
    #[error("executable for `{label}` is not an executable file: {}", path.display())]
    NotExecutable { label: String, path: PathBuf },

    /// An explicit entry was declared without a program.
    #[error("experiment `{0}` has an empty command")]
    EmptyCommand(String),

    #[error("device kind `{0}` is declared more than once")]
    DuplicateDeviceKind(String),

    #[error("device kind `{kind}` declares no indices")]
    NoDeviceIndices { kind: String },

    #[error("experiment `{experiment}` is restricted to undeclared device kind `{kind}`")]
    UnknownDeviceKind { experiment: String, kind: String },

    #[error("invocation timeout must be greater than zero")]
    ZeroTimeout,

    #[error("failed to read sweep declaration {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sweep declaration {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ── Reports ──────────────────────────────────────────────────────────────────

/// Failure to persist the final report.
///
/// The caller still owns the in-memory report when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to load a previously written report.
#[derive(Debug, thiserror::Error)]
pub enum ReportReadError {
    #[error("failed to read report {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report {} is malformed", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
