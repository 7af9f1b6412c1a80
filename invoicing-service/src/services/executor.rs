use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::services::ServiceError;

/// Runs an external program with piped stdio under a deadline.
///
/// The child is spawned with `kill_on_drop`, so it dies with the future on
/// timeout or when the calling request is cancelled.
#[derive(Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<Output, ServiceError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            program = %program,
            args = ?args,
            input_size = input.len(),
            timeout_secs = %self.timeout.as_secs(),
            "Executing command"
        );

        let mut child = cmd.spawn().map_err(|e| {
            ServiceError::Render(anyhow::anyhow!("Failed to start {}: {}", program, e))
        })?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            ServiceError::Render(anyhow::anyhow!("{} stdin unavailable", program))
        })?;

        // Feed stdin while draining stdout so neither pipe fills up.
        let feed = async move {
            stdin.write_all(input).await?;
            stdin.shutdown().await
        };
        let run = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                ServiceError::Render(anyhow::anyhow!(
                    "Command timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?;
        let output = output.map_err(|e| {
            ServiceError::Render(anyhow::anyhow!("Failed to wait for {}: {}", program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                program = %program,
                args = ?args,
                status = %output.status,
                stderr = %stderr,
                "Command failed"
            );
            return Err(ServiceError::Render(anyhow::anyhow!(
                "Command failed with {}: {}",
                output.status,
                stderr
            )));
        }

        if let Err(e) = fed {
            return Err(ServiceError::Render(anyhow::anyhow!(
                "Failed to write {} input: {}",
                program,
                e
            )));
        }

        tracing::debug!(
            program = %program,
            output_size = output.stdout.len(),
            "Command succeeded"
        );

        Ok(output)
    }
}
