//! Work-group size sweep engine.
//!
//! Benchmarks are external programs that take a device selector and three
//! work-group sizes on their command line and print a runtime. This crate
//! enumerates a grid of sizes per experiment, runs each configuration as its
//! own process, and reduces the timings into one JSON report.
//!
//! ```no_run
//! use std::path::Path;
//! use wgsweep_core::{
//!     ExperimentRegistry, ProcessLauncher, Schedule, Sweep, SweepDeclaration, SweepExecutor,
//!     export, write_report,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let declaration = SweepDeclaration::from_file(Path::new("sweep.toml"))?;
//! let registry = ExperimentRegistry::from_declaration(&declaration)?;
//! let executor = SweepExecutor::from_settings(ProcessLauncher::default(), &declaration.run)?;
//! let results = Sweep::new(&executor, Schedule::Sequential).run(&registry, &());
//! write_report(&declaration.run.output, &export(&results))?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod declaration;
pub mod error;
pub mod executor;
pub mod grid;
pub mod launch;
pub mod registry;
pub mod report;
pub mod schedule;
pub mod settings;
pub mod timing;

pub use aggregate::{ExperimentResult, Measurement, aggregate};
pub use declaration::{
    DeviceGroup, ExperimentEntry, ExplicitEntry, GridDeclaration, GridOverride, SweepDeclaration,
};
pub use error::{ConfigError, ExportError, ReportReadError};
pub use executor::{InvocationFailure, InvocationResult, SweepExecutor};
pub use grid::{AxisError, ConfigurationPoint, GRID_DIMS, Grid, GridAxis, GridError};
pub use launch::{Launch, LaunchStatus, Launcher, ProcessLauncher};
pub use registry::{DeviceSelector, ExperimentRegistry, ExperimentSpec, expanded_label};
pub use report::{ExperimentSummary, Report, export, read_report, write_report};
pub use schedule::{Schedule, Sweep, SweepObserver};
pub use settings::{DEFAULT_OUTPUT, DEFAULT_TIMEOUT_SECS, PointEncoding, RunSettings};
pub use timing::TimingFormat;
