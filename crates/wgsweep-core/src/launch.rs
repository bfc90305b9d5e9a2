//! Child process launching with a bounded wait.
//!
//! [`Launcher`] is the seam between the sweep executor and the operating
//! system. [`ProcessLauncher`] spawns a real child; tests substitute an
//! in-memory implementation.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How a launch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStatus {
    /// The child exited on its own. `code` is `None` when it died from a signal.
    Exited { code: Option<i32> },
    /// The child outlived its timeout and was killed.
    TimedOut,
    /// The child could not be started or waited on.
    SpawnFailed(String),
}

impl LaunchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0) })
    }
}

/// Everything observed about one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub status: LaunchStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl Launch {
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self {
            status: LaunchStatus::SpawnFailed(reason.into()),
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Runs one command line to completion or timeout.
pub trait Launcher: Send + Sync {
    fn launch(&self, argv: &[String], timeout: Duration) -> Launch;
}

impl<L: Launcher + ?Sized> Launcher for &L {
    fn launch(&self, argv: &[String], timeout: Duration) -> Launch {
        (**self).launch(argv, timeout)
    }
}

/// Spawns real child processes.
///
/// stdin is closed; stdout and stderr are drained on background threads so a
/// chatty child cannot block on a full pipe while we poll for its exit.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    poll_interval: Duration,
    output_grace: Duration,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(10), output_grace: Duration::from_secs(2) }
    }
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often the child's exit status is polled.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// How long to wait for pipe readers after the child is gone. Bounds the
    /// case where a grandchild inherited the pipes and keeps them open.
    pub fn output_grace(mut self, grace: Duration) -> Self {
        self.output_grace = grace;
        self
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, argv: &[String], timeout: Duration) -> Launch {
        let Some((program, args)) = argv.split_first() else {
            return Launch::spawn_failed("empty command line");
        };

        let started = Instant::now();
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let mut launch = Launch::spawn_failed(format!("failed to spawn {program}: {e}"));
                launch.elapsed = started.elapsed();
                return launch;
            }
        };

        let stdout = PipeReader::spawn(child.stdout.take());
        let stderr = PipeReader::spawn(child.stderr.take());

        let status = match wait_with_timeout(&mut child, timeout, self.poll_interval) {
            Ok(Some(status)) => LaunchStatus::Exited { code: status.code() },
            Ok(None) => LaunchStatus::TimedOut,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                LaunchStatus::SpawnFailed(format!("failed to wait on {program}: {e}"))
            }
        };
        let elapsed = started.elapsed();

        Launch {
            status,
            stdout: stdout.collect(self.output_grace),
            stderr: stderr.collect(self.output_grace),
            elapsed,
        }
    }
}

/// Poll until the child exits or `timeout` passes. On timeout the child is
/// killed and reaped, and `Ok(None)` is returned. A timeout too large to
/// represent as an `Instant` never expires.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    poll_interval: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let Some(deadline) = deadline else {
            thread::sleep(poll_interval);
            continue;
        };
        let now = Instant::now();
        if now >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

struct PipeReader {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let (tx, rx) = mpsc::channel();
        if let Some(mut pipe) = pipe {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send(buf);
            });
        }
        Self { rx }
    }

    fn collect(self, grace: Duration) -> String {
        let bytes = self.rx.recv_timeout(grace).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
