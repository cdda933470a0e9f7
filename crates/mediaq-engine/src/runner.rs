//! External process supervision.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use mediaq_models::JobError;

/// Maximum bytes retained per captured stream. Excess output is drained
/// and discarded so the child never blocks on a full pipe.
pub const MAX_CAPTURE_BYTES: usize = 256 * 1024;

/// Captured result of one external tool invocation.
///
/// A non-zero exit code is data, not an error; translating it into a job
/// failure is the worker's responsibility.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    /// The external tool could not be launched at all.
    #[error("failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The process outlived the allowed wall-clock time and was killed.
    #[error("process exceeded timeout of {timeout:?} and was killed")]
    Timeout { timeout: Duration },
}

impl From<RunnerError> for JobError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Spawn { command, message } => JobError::Spawn {
                message: format!("{command}: {message}"),
            },
            RunnerError::Timeout { timeout } => JobError::Timeout {
                timeout_secs: timeout.as_secs(),
            },
        }
    }
}

/// Boundary for spawning the external media tool, substitutable with a
/// fake in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command_args` (program first) to completion within `timeout`,
    /// capturing both output streams.
    async fn execute(
        &self,
        command_args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunnerError>;
}

/// Runner that spawns one real OS process per call.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(
        &self,
        command_args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunnerError> {
        let program = command_args.first().ok_or_else(|| RunnerError::Spawn {
            command: String::new(),
            message: "empty command".to_string(),
        })?;

        which::which(program).map_err(|e| RunnerError::Spawn {
            command: program.clone(),
            message: e.to_string(),
        })?;

        debug!(command = %command_args.join(" "), "spawning external tool");

        let mut child = Command::new(program)
            .args(&command_args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Spawn {
                command: program.clone(),
                message: e.to_string(),
            })?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");
        let out_task = tokio::spawn(read_capped(stdout, MAX_CAPTURE_BYTES));
        let err_task = tokio::spawn(read_capped(stderr, MAX_CAPTURE_BYTES));

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(RunnerError::Spawn {
                    command: program.clone(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    command = %program,
                    timeout_secs = timeout.as_secs(),
                    "process timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(command = %program, "failed to kill timed-out process: {e}");
                }
                return Err(RunnerError::Timeout { timeout });
            }
        };

        let stdout = out_task.await.unwrap_or_default();
        let stderr = err_task.await.unwrap_or_default();

        Ok(CommandOutput {
            // Terminated by signal yields no code
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Drain a stream to EOF, retaining at most `cap` bytes.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> Vec<u8> {
    let mut retained = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if retained.len() < cap {
                    let take = n.min(cap - retained.len());
                    retained.extend_from_slice(&chunk[..take]);
                }
            }
        }
    }
    retained
}
