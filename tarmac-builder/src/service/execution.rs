//! Build execution
//!
//! Runs the build command inside a reconstructed source tree. Output is
//! streamed line by line into the log as it is produced, so long builds are
//! observable while they run.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn build command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("build command exited with {}", exit_description(.0))]
    Exited(Option<i32>),

    #[error("build command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to wait for build command: {0}")]
    Wait(#[source] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Service trait for running a deployment's build
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Builds the tree rooted at `root`
    ///
    /// Succeeds only if the build ran to completion with exit code 0.
    async fn execute(&self, id: &str, root: &Path) -> Result<(), ExecutionError>;
}

/// Runs a shell command through `sh -c`
pub struct ShellBuildExecutor {
    command: String,
    timeout: Duration,
}

impl ShellBuildExecutor {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    fn command(&self, root: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl BuildExecutor for ShellBuildExecutor {
    async fn execute(&self, id: &str, root: &Path) -> Result<(), ExecutionError> {
        info!(id = %id, command = %self.command, "Running build command");

        let mut child = self.command(root).spawn().map_err(ExecutionError::Spawn)?;

        let outcome = tokio::time::timeout(self.timeout, stream_output(id, &mut child)).await;
        let status = match outcome {
            Ok(status) => status.map_err(ExecutionError::Wait)?,
            Err(_) => {
                warn!(id = %id, timeout = ?self.timeout, "Build timed out, killing it");
                if let Err(e) = child.kill().await {
                    warn!(id = %id, error = %e, "Failed to kill build command");
                }
                return Err(ExecutionError::TimedOut(self.timeout));
            }
        };

        if status.success() {
            info!(id = %id, "Build command succeeded");
            Ok(())
        } else {
            Err(ExecutionError::Exited(status.code()))
        }
    }
}

/// Logs stdout at info and stderr at warn until both close, then reaps the child
async fn stream_output(id: &str, child: &mut Child) -> std::io::Result<ExitStatus> {
    let mut stdout_reader = child.stdout.take().map(|s| BufReader::new(s).lines());
    let mut stderr_reader = child.stderr.take().map(|s| BufReader::new(s).lines());

    let mut stdout_done = stdout_reader.is_none();
    let mut stderr_done = stderr_reader.is_none();

    while !stdout_done || !stderr_done {
        tokio::select! {
            line = async {
                match stdout_reader.as_mut() {
                    Some(reader) => reader.next_line().await,
                    None => std::future::pending().await,
                }
            }, if !stdout_done => {
                match line {
                    Ok(Some(line)) => info!(id = %id, "{}", line),
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        debug!(id = %id, error = %e, "Error reading stdout");
                        stdout_done = true;
                    }
                }
            }
            line = async {
                match stderr_reader.as_mut() {
                    Some(reader) => reader.next_line().await,
                    None => std::future::pending().await,
                }
            }, if !stderr_done => {
                match line {
                    Ok(Some(line)) => warn!(id = %id, "{}", line),
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        debug!(id = %id, error = %e, "Error reading stderr");
                        stderr_done = true;
                    }
                }
            }
        }
    }

    child.wait().await
}
