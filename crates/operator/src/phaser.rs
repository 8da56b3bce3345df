//! The contract every operator satisfies.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Outcome of the Plan phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The desired post-condition already holds; Commit and Verify are
    /// skipped and the report succeeds with last phase Plan.
    AlreadyApplied,
    /// A mutation is required; the engine proceeds to Commit.
    MutationRequired,
}

impl PlanOutcome {
    pub fn already_applied(&self) -> bool {
        matches!(self, PlanOutcome::AlreadyApplied)
    }
}

/// Lifecycle methods driven by the [`Executor`](crate::Executor).
///
/// Phase methods return plain errors; the engine stamps them with the phase
/// tag when building the report. Phasers must not log above debug for their
/// own failures.
#[async_trait]
pub trait Phaser: Send {
    /// Parse and validate arguments, construct collaborators lazily, probe
    /// the current state and record it as `before`. When the desired state
    /// already holds, record `after` too and return
    /// [`PlanOutcome::AlreadyApplied`].
    async fn plan(&mut self, token: &CancellationToken) -> anyhow::Result<PlanOutcome>;

    /// Apply the mutation. Only invoked when Plan required a mutation.
    async fn commit(&mut self, token: &CancellationToken) -> anyhow::Result<()>;

    /// Re-probe the state; record `after` when it matches intent, fail
    /// otherwise.
    async fn verify(&mut self, token: &CancellationToken) -> anyhow::Result<()>;

    /// Best-effort inversion of the mutation back to the `before` state.
    async fn rollback(&mut self, token: &CancellationToken) -> anyhow::Result<()>;

    /// The before/after diff for the success report.
    fn operation_diff(&self) -> HashMap<String, String>;

    /// Release collaborator handles. Runs exactly once per execution,
    /// regardless of outcome; the default is a no-op.
    async fn after(&mut self) {}
}
