//! Per-experiment sweep execution.
//!
//! [`SweepExecutor::run`] walks an experiment's grid in enumeration order and
//! launches `base_command + encode(point)` once per point. A point that fails
//! in any way is recorded and the walk continues.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::grid::ConfigurationPoint;
use crate::launch::{Launch, LaunchStatus, Launcher, ProcessLauncher};
use crate::registry::ExperimentSpec;
use crate::settings::{DEFAULT_TIMEOUT_SECS, PointEncoding, RunSettings};
use crate::timing::TimingFormat;

/// Why a point produced no timing. Recorded, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationFailure {
    #[error("could not run program: {0}")]
    Spawn(String),

    #[error("{}", describe_exit(*code))]
    ExitStatus { code: Option<i32> },

    #[error("timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("exited successfully but printed no parsable timing")]
    UnparsableTiming,
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Outcome of invoking one configuration point.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub point: ConfigurationPoint,
    pub succeeded: bool,
    /// Present iff `succeeded`.
    pub timing_seconds: Option<f64>,
    /// stdout followed by stderr; diagnostics only.
    pub raw_output: String,
    pub failure: Option<InvocationFailure>,
    /// Wall-clock time of the invocation as seen by the harness.
    pub elapsed: Duration,
}

impl InvocationResult {
    pub fn success(point: ConfigurationPoint, seconds: f64) -> Self {
        Self {
            point,
            succeeded: true,
            timing_seconds: Some(seconds),
            raw_output: String::new(),
            failure: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn failure(point: ConfigurationPoint, failure: InvocationFailure) -> Self {
        Self {
            point,
            succeeded: false,
            timing_seconds: None,
            raw_output: String::new(),
            failure: Some(failure),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_output(mut self, raw_output: impl Into<String>) -> Self {
        self.raw_output = raw_output.into();
        self
    }
}

/// Runs every point of an experiment through a [`Launcher`].
#[derive(Debug, Clone)]
pub struct SweepExecutor<L = ProcessLauncher> {
    launcher: L,
    timeout: Duration,
    encoding: PointEncoding,
    timing: TimingFormat,
}

impl SweepExecutor<ProcessLauncher> {
    pub fn new() -> Self {
        Self::with_launcher(ProcessLauncher::default())
    }
}

impl Default for SweepExecutor<ProcessLauncher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Launcher> SweepExecutor<L> {
    pub fn with_launcher(launcher: L) -> Self {
        Self {
            launcher,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            encoding: PointEncoding::default(),
            timing: TimingFormat::default(),
        }
    }

    /// Build from run settings; fails on a zero timeout.
    pub fn from_settings(launcher: L, settings: &RunSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            launcher,
            timeout: settings.timeout()?,
            encoding: settings.encoding.clone(),
            timing: settings.timing.clone(),
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn encoding(mut self, encoding: PointEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn timing(mut self, timing: TimingFormat) -> Self {
        self.timing = timing;
        self
    }

    pub fn invocation_timeout(&self) -> Duration {
        self.timeout
    }

    /// Full command line for one point.
    pub fn command_line(&self, spec: &ExperimentSpec, point: &ConfigurationPoint) -> Vec<String> {
        let mut argv = spec.base_command.clone();
        argv.extend(self.encoding.encode(point));
        argv
    }

    pub fn invoke(&self, spec: &ExperimentSpec, point: ConfigurationPoint) -> InvocationResult {
        let argv = self.command_line(spec, &point);
        debug!(label = %spec.label, %point, command = ?argv, "launching");
        let launch = self.launcher.launch(&argv, self.timeout);
        self.interpret(point, launch)
    }

    fn interpret(&self, point: ConfigurationPoint, launch: Launch) -> InvocationResult {
        let Launch { status, stdout, stderr, elapsed } = launch;
        let timing = match &status {
            LaunchStatus::Exited { code: Some(0) } => self.timing.parse(&stdout),
            _ => None,
        };
        let failure = match status {
            LaunchStatus::Exited { code: Some(0) } if timing.is_some() => None,
            LaunchStatus::Exited { code: Some(0) } => Some(InvocationFailure::UnparsableTiming),
            LaunchStatus::Exited { code } => Some(InvocationFailure::ExitStatus { code }),
            LaunchStatus::TimedOut => Some(InvocationFailure::TimedOut { after: self.timeout }),
            LaunchStatus::SpawnFailed(reason) => Some(InvocationFailure::Spawn(reason)),
        };

        let mut raw_output = stdout;
        raw_output.push_str(&stderr);
        InvocationResult {
            point,
            succeeded: failure.is_none(),
            timing_seconds: timing.filter(|_| failure.is_none()),
            raw_output,
            failure,
            elapsed,
        }
    }

    /// Run every point of `spec` in enumeration order.
    pub fn run(&self, spec: &ExperimentSpec) -> Vec<InvocationResult> {
        self.run_with(spec, |_| {})
    }

    /// As [`run`](Self::run), calling `observe` after each point.
    pub fn run_with(
        &self,
        spec: &ExperimentSpec,
        mut observe: impl FnMut(&InvocationResult),
    ) -> Vec<InvocationResult> {
        info!(label = %spec.label, points = spec.grid.len(), "sweeping experiment");
        let mut results = Vec::with_capacity(spec.grid.len());
        for point in spec.grid.points() {
            let result = self.invoke(spec, point);
            match (&result.failure, result.timing_seconds) {
                (Some(failure), _) => {
                    warn!(label = %spec.label, %point, %failure, "configuration failed")
                }
                (None, Some(seconds)) => {
                    debug!(label = %spec.label, %point, seconds, "configuration timed")
                }
                (None, None) => {}
            }
            observe(&result);
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use std::sync::Mutex;

    /// Replies from a fixed script keyed on the last argument.
    struct ScriptedLauncher {
        calls: Mutex<Vec<Vec<String>>>,
        reply: fn(&[String]) -> Launch,
    }

    impl Launcher for ScriptedLauncher {
        fn launch(&self, argv: &[String], _timeout: Duration) -> Launch {
            self.calls.lock().unwrap().push(argv.to_vec());
            (self.reply)(argv)
        }
    }

    fn exited(code: i32, stdout: &str) -> Launch {
        Launch {
            status: LaunchStatus::Exited { code: Some(code) },
            stdout: stdout.to_string(),
            stderr: String::new(),
            elapsed: Duration::from_millis(1),
        }
    }

    fn spec(grid: Grid) -> ExperimentSpec {
        ExperimentSpec::new("X", vec!["prog".into(), "-gpu".into(), "0".into()], grid)
    }

    #[test]
    fn test_command_line_appends_encoded_point() {
        let exec = SweepExecutor::new().encoding(PointEncoding::Positional);
        let argv = exec.command_line(&spec(Grid::single_point()), &ConfigurationPoint::new(8, 4, 1));
        assert_eq!(argv, ["prog", "-gpu", "0", "8", "4", "1"]);
    }

    #[test]
    fn test_run_records_every_point_in_order() {
        let launcher = ScriptedLauncher {
            calls: Mutex::new(Vec::new()),
            reply: |argv| match argv[4].as_str() {
                "1" => exited(0, "time 0.5"),
                _ => exited(1, "CL_INVALID_WORK_GROUP_SIZE"),
            },
        };
        let exec = SweepExecutor::with_launcher(&launcher);
        let grid = Grid::from_values([vec![1, 2], vec![4], vec![1]]).unwrap();
        let results = exec.run(&spec(grid));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].point, ConfigurationPoint::new(1, 4, 1));
        assert!(results[0].succeeded);
        assert_eq!(results[0].timing_seconds, Some(0.5));
        assert_eq!(results[1].point, ConfigurationPoint::new(2, 4, 1));
        assert!(!results[1].succeeded);
        assert_eq!(results[1].timing_seconds, None);
        assert_eq!(results[1].failure, Some(InvocationFailure::ExitStatus { code: Some(1) }));
        assert!(results[1].raw_output.contains("CL_INVALID_WORK_GROUP_SIZE"));
        assert_eq!(launcher.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unparsable_output_is_failure() {
        let launcher =
            ScriptedLauncher { calls: Mutex::new(Vec::new()), reply: |_| exited(0, "done") };
        let exec = SweepExecutor::with_launcher(&launcher);
        let results = exec.run(&spec(Grid::single_point()));
        assert!(!results[0].succeeded);
        assert_eq!(results[0].failure, Some(InvocationFailure::UnparsableTiming));
    }

    #[test]
    fn test_timeout_is_failure() {
        let launcher = ScriptedLauncher {
            calls: Mutex::new(Vec::new()),
            reply: |_| Launch {
                status: LaunchStatus::TimedOut,
                stdout: "0.1".to_string(),
                stderr: String::new(),
                elapsed: Duration::from_secs(5),
            },
        };
        let exec = SweepExecutor::with_launcher(&launcher).timeout(Duration::from_secs(5));
        let results = exec.run(&spec(Grid::single_point()));
        assert!(!results[0].succeeded);
        assert_eq!(results[0].timing_seconds, None);
        assert_eq!(
            results[0].failure,
            Some(InvocationFailure::TimedOut { after: Duration::from_secs(5) })
        );
    }

    #[test]
    fn test_nonzero_exit_ignores_printed_number() {
        let launcher =
            ScriptedLauncher { calls: Mutex::new(Vec::new()), reply: |_| exited(2, "0.25") };
        let exec = SweepExecutor::with_launcher(&launcher);
        let results = exec.run(&spec(Grid::single_point()));
        assert!(!results[0].succeeded);
        assert_eq!(results[0].timing_seconds, None);
    }

    #[test]
    fn test_from_settings_rejects_zero_timeout() {
        let settings = RunSettings { timeout_secs: 0, ..RunSettings::default() };
        let err = SweepExecutor::from_settings(ProcessLauncher::default(), &settings).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            InvocationFailure::ExitStatus { code: Some(255) }.to_string(),
            "exited with status 255"
        );
        assert_eq!(InvocationFailure::ExitStatus { code: None }.to_string(), "terminated by signal");
    }
}
