//! Deadline-scoped subprocess execution.
//!
//! Every external tool invocation runs under a hard deadline. On expiry
//! the child is killed and its pipes drained before the call returns, so
//! a wedged tool cannot leak a zombie process or a blocked reader.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// One tool invocation. `env` is the complete child environment; nothing
/// is inherited from the parent process.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

/// The observed outcome of a tool invocation. A timed-out run has
/// `timed_out == true` and no exit code.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub latency_ms: u64,
}

impl ToolOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Subprocess seam. Stubbed in tests so retrieval and scheduling logic
/// can be exercised without a real binary.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the command to completion or deadline. Spawn failures are the
    /// only error; a timeout is reported inside the output.
    async fn run(&self, command: ToolCommand) -> std::io::Result<ToolOutput>;
}

/// Production runner on top of `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioToolRunner;

#[async_trait]
impl ToolRunner for TokioToolRunner {
    async fn run(&self, command: ToolCommand) -> std::io::Result<ToolOutput> {
        let started = Instant::now();

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .env_clear()
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Read pipes concurrently with the wait: a child that fills its
        // pipe buffer must not deadlock against us.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let exit_code = match tokio::time::timeout(command.timeout, child.wait()).await {
            Ok(Ok(status)) => status.code(),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                let _ = child.kill().await;
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                return Ok(ToolOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: true,
                    latency_ms: started.elapsed().as_millis() as u64,
                });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ToolOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            timed_out: false,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}
