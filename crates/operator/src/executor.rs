//! Phased execution engine.
//!
//! Drives one operator lifecycle deterministically and produces the terminal
//! report:
//!
//! - Plan may short-circuit with "already applied", the engine's idempotence
//!   primitive
//! - a Commit or Verify failure triggers Rollback; the error phase is only
//!   overridden to Rollback when the rollback itself also fails
//! - the `after` hook runs exactly once per run, success or not

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::phase::Phase;
use crate::phaser::{Phaser, PlanOutcome};
use crate::report::ExecutionReport;

/// One-shot driver for a single operator execution.
pub struct Executor {
    phaser: Box<dyn Phaser>,
    operation_id: String,
}

impl Executor {
    pub fn new(phaser: Box<dyn Phaser>, operation_id: impl Into<String>) -> Self {
        Self {
            phaser,
            operation_id: operation_id.into(),
        }
    }

    /// Drive the lifecycle to its terminal report.
    ///
    /// Cancellation of `token` surfaces as a phase error from whatever phase
    /// was in flight and follows the same rollback path as any other error.
    pub async fn run(mut self, token: &CancellationToken) -> ExecutionReport {
        let report = self.drive(token).await;

        // Best effort teardown; failures and cancellation are swallowed.
        self.phaser.after().await;

        match report.error_outcome() {
            None => info!(operation_id = %report.operation_id, "operation succeeded"),
            Some(error) => warn!(
                operation_id = %report.operation_id,
                phase = %error.phase,
                message = %error.message,
                "operation failed"
            ),
        }

        report
    }

    async fn drive(&mut self, token: &CancellationToken) -> ExecutionReport {
        debug!(operation_id = %self.operation_id, phase = %Phase::Plan, "phase started");
        match self.phaser.plan(token).await {
            Err(error) => {
                return ExecutionReport::error(
                    &self.operation_id,
                    Phase::Plan,
                    format!("{error:#}"),
                );
            }
            Ok(PlanOutcome::AlreadyApplied) => {
                info!(operation_id = %self.operation_id, "already applied, skipping commit and verify");
                let diff = self.phaser.operation_diff();
                return ExecutionReport::success(&self.operation_id, Phase::Plan, diff);
            }
            Ok(PlanOutcome::MutationRequired) => {}
        }

        debug!(operation_id = %self.operation_id, phase = %Phase::Commit, "phase started");
        if let Err(error) = self.phaser.commit(token).await {
            return self.handle_rollback(token, Phase::Commit, error).await;
        }

        debug!(operation_id = %self.operation_id, phase = %Phase::Verify, "phase started");
        if let Err(error) = self.phaser.verify(token).await {
            return self.handle_rollback(token, Phase::Verify, error).await;
        }

        let diff = self.phaser.operation_diff();
        ExecutionReport::success(&self.operation_id, Phase::Verify, diff)
    }

    async fn handle_rollback(
        &mut self,
        token: &CancellationToken,
        failed_phase: Phase,
        original: anyhow::Error,
    ) -> ExecutionReport {
        warn!(
            operation_id = %self.operation_id,
            phase = %failed_phase,
            error = %format!("{original:#}"),
            "phase failed, rolling back"
        );

        match self.phaser.rollback(token).await {
            Ok(()) => {
                ExecutionReport::error(&self.operation_id, failed_phase, format!("{original:#}"))
            }
            // The rollback failure stopped recovery, so it sorts first.
            Err(rollback_error) => ExecutionReport::error(
                &self.operation_id,
                Phase::Rollback,
                format!("{rollback_error:#}\n{original:#}"),
            ),
        }
    }
}
