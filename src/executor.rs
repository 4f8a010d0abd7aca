//! BoundedExecutor - runs external commands under a hard wall-clock limit
//!
//! The child is spawned on its own task and its exit is raced against a
//! deadline. On overrun the external process is killed and reaped; the
//! calling monitor task is never aborted.
//!
//! ```text
//! run() → spawn task → spawn child ─┬─ stdout pump ─┐
//!                                   ├─ stderr pump ─┼─→ combined output
//!                                   └─ wait ⟷ deadline → kill + reap
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, instrument, trace, warn};

use crate::error::{GuardError, GuardResult};

/// Time limit used when the caller does not ask for one, and the lowest it may ask for
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// How long output pumps may keep draining after the child is gone
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// Result of a bounded execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// OS process identifier of the child
    pub pid: Option<u32>,

    /// Exit code, `None` if the child was killed or terminated by a signal
    pub exit_code: Option<i32>,

    /// Captured stdout and stderr in arrival order
    pub output: String,

    /// The child overran its time limit and was killed
    pub timed_out: bool,
}

impl ExecOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs external commands with a hard timeout
#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    minimum_timeout: Duration,
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundedExecutor {
    pub fn new() -> Self {
        Self {
            minimum_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Executor whose floor (and default) time limit is `minimum`
    pub fn with_minimum_timeout(minimum: Duration) -> Self {
        Self {
            minimum_timeout: minimum,
        }
    }

    /// Time limit actually applied for a requested one
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested.map_or(self.minimum_timeout, |requested| {
            requested.max(self.minimum_timeout)
        })
    }

    /// Run `command` in `work_dir` and wait at most the effective timeout for it
    ///
    /// Failing to start the process is returned as `GuardError::RecoveryExecution`.
    /// A failure while killing an overrunning child is logged; `timed_out` is
    /// still reported.
    #[instrument(skip(self, command, work_dir, args), fields(command = %command.display()))]
    pub async fn run(
        &self,
        command: &Path,
        work_dir: &Path,
        args: &[String],
        timeout: Option<Duration>,
    ) -> GuardResult<ExecOutcome> {
        let timeout = self.effective_timeout(timeout);
        debug!("executing with a limit of {timeout:?}");

        let task = tokio::spawn(execute(
            command.to_path_buf(),
            work_dir.to_path_buf(),
            args.to_vec(),
            timeout,
        ));

        task.await?
    }
}

async fn execute(
    command: PathBuf,
    work_dir: PathBuf,
    args: Vec<String>,
    timeout: Duration,
) -> GuardResult<ExecOutcome> {
    let mut child = Command::new(&command)
        .args(&args)
        .current_dir(&work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            GuardError::RecoveryExecution(format!("failed to start {}: {e}", command.display()))
        })?;

    let pid = child.id();
    trace!("spawned child with pid {pid:?}");

    let captured = Arc::new(Mutex::new(Vec::new()));
    let mut pumps = vec![];
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(stdout, captured.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(stderr, captured.clone())));
    }

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => (status.code(), false),
        Ok(Err(e)) => {
            error!("failed to wait for pid {pid:?}: {e}");
            (None, false)
        }
        Err(_) => {
            warn!("pid {pid:?} did not finish within {timeout:?}, killing it");
            // kill() also reaps the child, so nothing is left running afterwards
            if let Err(e) = child.kill().await {
                error!("failed to kill pid {pid:?}: {e}");
            }
            (None, true)
        }
    };

    // grandchildren may keep the pipes open, so draining is bounded too
    for mut pump in pumps {
        if tokio::time::timeout(OUTPUT_DRAIN, &mut pump).await.is_err() {
            pump.abort();
        }
    }

    let mut output = {
        let bytes = captured.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).replace('\r', "")
    };

    if timed_out {
        output.push_str(&format!("* execution exceeded the time limit of {timeout:?}"));
    }

    Ok(ExecOutcome {
        pid,
        exit_code,
        output,
        timed_out,
    })
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(&chunk[..n]),
            Err(e) => {
                trace!("output pipe closed: {e}");
                break;
            }
        }
    }
}
