//! Bounded exponential backoff for idempotent probes.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Backoff schedule: the delay after attempt `i` is
/// `min(initial_delay * factor^i, max_delay)`.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    /// Integer multiplier, clamped to at least 1.
    pub factor: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_retries: 5,
            factor: 2,
        }
    }
}

impl Backoff {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = match self.factor.max(1).checked_pow(attempt) {
            Some(multiplier) => self.initial_delay.saturating_mul(multiplier),
            None => self.max_delay,
        };
        delay.min(self.max_delay)
    }

    /// Drive `probe` until it succeeds, `max_retries` attempts are
    /// exhausted, or the token is cancelled.
    ///
    /// Returns `Ok` on the first success, the last probe error on
    /// exhaustion, or a cancellation error. The inter-attempt sleep wakes
    /// immediately on cancellation.
    pub async fn retry<F, Fut>(&self, token: &CancellationToken, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match probe().await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    debug!(attempt, error = %format!("{error:#}"), "probe attempt failed");
                    last_error = Some(error);
                }
            }

            if attempt + 1 < self.max_retries {
                sleep_cancellable(token, self.delay_for_attempt(attempt)).await?;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("no retry attempts were configured")))
    }
}

/// Sleep for `duration`, waking immediately when `token` is cancelled.
///
/// The timer future is dropped eagerly on the cancellation branch.
pub async fn sleep_cancellable(token: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        () = token.cancelled() => Err(anyhow!("operation cancelled")),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}
