//! Command executor trait and the tokio-backed system implementation.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Runs an external program and returns its combined stdout/stderr.
///
/// Every call takes a cancellation token; implementations must stop the
/// in-flight process and return [`Error::Cancelled`] when the token fires.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `program` with `args`, waiting for completion.
    ///
    /// On success the combined stdout/stderr bytes are returned. A non-zero
    /// exit maps to [`Error::NonZeroExit`] carrying the captured output.
    async fn exec(
        &self,
        token: &CancellationToken,
        program: &str,
        args: &[&str],
    ) -> Result<Vec<u8>>;
}

/// Default executor spawning real processes on the host.
///
/// The child is bound to the cancellation token: when the token fires the
/// wait future is dropped and the process is killed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn exec(
        &self,
        token: &CancellationToken,
        program: &str,
        args: &[&str],
    ) -> Result<Vec<u8>> {
        debug!(program, ?args, "executing command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let output = tokio::select! {
            // Dropping the wait future kills the child via kill_on_drop.
            () = token.cancelled() => {
                debug!(program, "command cancelled");
                return Err(Error::Cancelled {
                    program: program.to_string(),
                });
            }
            result = &mut wait => result.map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?,
        };

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        if output.status.success() {
            return Ok(combined);
        }

        match output.status.code() {
            Some(code) => Err(Error::NonZeroExit {
                program: program.to_string(),
                code,
                output: String::from_utf8_lossy(&combined).to_string(),
            }),
            None => Err(Error::Terminated {
                program: program.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exec_captures_output() {
        let executor = SystemExecutor;
        let token = CancellationToken::new();

        let output = executor
            .exec(&token, "sh", &["-c", "echo out; echo err >&2"])
            .await
            .unwrap();
        let combined = String::from_utf8_lossy(&output);

        assert!(combined.contains("out"));
        assert!(combined.contains("err"));
    }

    #[tokio::test]
    async fn test_exec_nonzero_exit() {
        let executor = SystemExecutor;
        let token = CancellationToken::new();

        let err = executor
            .exec(&token, "sh", &["-c", "echo broken; exit 3"])
            .await
            .unwrap_err();

        match err {
            Error::NonZeroExit { code, output, .. } => {
                assert_eq!(code, 3);
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_exec_spawn_failure() {
        let executor = SystemExecutor;
        let token = CancellationToken::new();

        let err = executor
            .exec(&token, "definitely-not-a-real-binary-2ae1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_exec_cancellation_interrupts() {
        let executor = SystemExecutor;
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let err = executor
            .exec(&token, "sleep", &["30"])
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
