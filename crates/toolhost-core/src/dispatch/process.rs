use crate::error::{Result, ToolhostError};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Everything a tool process produced, unmodified.
#[derive(Debug, Clone)]
pub struct DispatchOutput {
    pub name: String,
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl DispatchOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Turn a non-zero exit into [`ToolhostError::Execution`].
    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(ToolhostError::Execution {
            code: self.code(),
            stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
            name: self.name,
        })
    }
}

/// A fully resolved tool launch.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub name: String,
    pub interpreter: PathBuf,
    pub entry_point: PathBuf,
    pub env: Vec<(String, PathBuf)>,
}

impl Invocation {
    /// Start the process, stream `payload` to its stdin and close it, then
    /// collect both output streams and the exit status.
    ///
    /// Stdin is fed from a separate task while the outputs are drained, so a
    /// tool that writes before it finishes reading cannot deadlock on a full
    /// pipe. Blocks until the process exits.
    pub async fn execute(&self, payload: Vec<u8>) -> Result<DispatchOutput> {
        debug!(tool = %self.name, "launching {:?} {:?}", self.interpreter, self.entry_point);
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.entry_point)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = self.entry_point.parent() {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("no stdin from tool process"))?;
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        });

        let output = child.wait_with_output().await?;

        match writer.await {
            Ok(Ok(())) => {}
            // The tool exited without consuming all of its input.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!(tool = %self.name, "tool closed stdin early");
            }
            Ok(Err(e)) => warn!(tool = %self.name, "failed writing payload: {}", e),
            Err(e) => warn!(tool = %self.name, "payload writer aborted: {}", e),
        }

        Ok(DispatchOutput {
            name: self.name.clone(),
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn spawn_error(&self, e: std::io::Error) -> ToolhostError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolhostError::RuntimeNotFound {
                name: self.name.clone(),
                interpreter: self.interpreter.clone(),
            }
        } else {
            ToolhostError::Io(e)
        }
    }
}
