//! Process execution for control-surface commands.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::GatewayError;

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr joined, for classifiers that look at both.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs a program with arguments and captures its output.
///
/// Arguments are passed argv-style; nothing goes through a shell.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, GatewayError>;
}

/// Real subprocess execution backed by `tokio::process::Command`.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, GatewayError> {
        let start = Instant::now();
        tracing::debug!(program, ?args, "running control command");

        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(GatewayError::Command {
                    program: program.to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                tracing::warn!(program, timeout_ms = self.timeout.as_millis() as u64, "control command timed out");
                return Err(GatewayError::Command {
                    program: program.to_string(),
                    message: format!("timed out after {}ms", self.timeout.as_millis()),
                });
            }
        };

        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(
            program,
            code = ?result.code,
            duration_ms = start.elapsed().as_millis() as u64,
            "control command finished"
        );
        Ok(result)
    }
}
