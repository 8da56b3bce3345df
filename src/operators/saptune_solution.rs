//! Saptune solution operators.
//!
//! `saptuneapplysolution` applies a solution on a host with none applied;
//! `saptunechangesolution` replaces whatever is applied using
//! `saptune solution change --force`. Neither rolls back: reverting a
//! partially applied tuning state is riskier than leaving it in place.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use operator::{
    Arguments, ArgumentsExt, BaseOperator, BaseOptions, Executor, Phaser, PlanOutcome, Snapshot,
};
use saptune::{Saptune, SaptuneClient};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const SAPTUNE_APPLY_SOLUTION: &str = "saptuneapplysolution";
pub const SAPTUNE_CHANGE_SOLUTION: &str = "saptunechangesolution";

/// Options for both saptune solution operators.
#[derive(Default)]
pub struct SaptuneSolutionOptions {
    pub base: BaseOptions,
    /// Saptune client override; defaults to the CLI client on the base
    /// executor.
    pub saptune: Option<Arc<dyn Saptune>>,
}

impl SaptuneSolutionOptions {
    fn saptune_client(self) -> Arc<dyn Saptune> {
        match self.saptune {
            Some(client) => client,
            None => Arc::new(SaptuneClient::new(self.base.executor())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SolutionState {
    solution: String,
}

struct SolutionArguments {
    solution: String,
}

fn parse_solution_arguments(arguments: &Arguments) -> Result<SolutionArguments> {
    Ok(SolutionArguments {
        solution: arguments.required_string("solution")?,
    })
}

/// Applies a saptune solution.
///
/// Plan fails when saptune is missing or too old and records the initially
/// applied solution. Commit is a no-op when the requested solution is
/// already applied and fails when a different one is: only one solution may
/// be applied at a time.
pub struct SaptuneApplySolution {
    base: BaseOperator,
    saptune: Arc<dyn Saptune>,
    parsed: Option<SolutionArguments>,
    snapshot: Snapshot<SolutionState>,
}

impl SaptuneApplySolution {
    pub fn build(
        arguments: Arguments,
        operation_id: &str,
        options: SaptuneSolutionOptions,
    ) -> Executor {
        let phaser = Self {
            base: BaseOperator::new(SAPTUNE_APPLY_SOLUTION, operation_id, arguments),
            saptune: options.saptune_client(),
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }

    fn requested(&self) -> &str {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.solution.as_str())
            .unwrap_or_default()
    }

    fn initially_applied(&self) -> &str {
        self.snapshot
            .before()
            .map(|state| state.solution.as_str())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Phaser for SaptuneApplySolution {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        self.parsed = Some(parse_solution_arguments(self.base.arguments())?);

        self.saptune.check_version_support(token).await?;

        let applied = self.saptune.get_applied_solution(token).await?;
        self.snapshot.record_before(SolutionState { solution: applied });

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        let requested = self.requested().to_string();
        let initially_applied = self.initially_applied().to_string();

        if initially_applied == requested {
            self.base.span().in_scope(|| {
                info!(solution = %requested, "solution already applied, skipping commit phase");
            });
            return Ok(());
        }

        if !initially_applied.is_empty() {
            bail!(
                "cannot apply solution {requested} because another solution {initially_applied} is already applied"
            );
        }

        self.saptune.apply_solution(token, &requested).await?;
        Ok(())
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let applied = self.saptune.get_applied_solution(token).await?;

        if applied != self.requested() {
            bail!(
                "verify saptune apply failing, the solution {} was not applied in commit phase",
                self.requested()
            );
        }

        self.snapshot.record_after(SolutionState { solution: applied });
        Ok(())
    }

    async fn rollback(&mut self, _token: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}

/// Replaces the applied saptune solution.
///
/// Same shape as [`SaptuneApplySolution`] but commits through
/// `saptune solution change --force`, which tolerates an already applied,
/// different solution.
pub struct SaptuneChangeSolution {
    base: BaseOperator,
    saptune: Arc<dyn Saptune>,
    parsed: Option<SolutionArguments>,
    snapshot: Snapshot<SolutionState>,
}

impl SaptuneChangeSolution {
    pub fn build(
        arguments: Arguments,
        operation_id: &str,
        options: SaptuneSolutionOptions,
    ) -> Executor {
        let phaser = Self {
            base: BaseOperator::new(SAPTUNE_CHANGE_SOLUTION, operation_id, arguments),
            saptune: options.saptune_client(),
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }

    fn requested(&self) -> &str {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.solution.as_str())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Phaser for SaptuneChangeSolution {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        self.parsed = Some(parse_solution_arguments(self.base.arguments())?);

        self.saptune.check_version_support(token).await?;

        let applied = self.saptune.get_applied_solution(token).await?;
        self.snapshot.record_before(SolutionState { solution: applied });

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        let requested = self.requested().to_string();
        let initially_applied = self
            .snapshot
            .before()
            .map(|state| state.solution.clone())
            .unwrap_or_default();

        if initially_applied == requested {
            self.base.span().in_scope(|| {
                info!(solution = %requested, "solution already applied, skipping commit phase");
            });
            return Ok(());
        }

        self.saptune.change_solution(token, &requested).await?;
        Ok(())
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let applied = self.saptune.get_applied_solution(token).await?;

        if applied != self.requested() {
            bail!(
                "verify saptune change failing, the solution {} was not applied in commit phase",
                self.requested()
            );
        }

        self.snapshot.record_after(SolutionState { solution: applied });
        Ok(())
    }

    async fn rollback(&mut self, _token: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}

#[cfg(test)]
mod tests {
    use operator::Phase;

    use super::*;
    use crate::operators::testing::StubSaptune;

    fn arguments(solution: &str) -> Arguments {
        let mut arguments = Arguments::new();
        arguments.insert("solution".into(), serde_json::json!(solution));
        arguments
    }

    fn options(saptune: Arc<StubSaptune>) -> SaptuneSolutionOptions {
        SaptuneSolutionOptions {
            base: BaseOptions::default(),
            saptune: Some(saptune),
        }
    }

    #[tokio::test]
    async fn test_apply_solution_already_applied() {
        let stub = Arc::new(StubSaptune::new("3.1.0", "HANA"));
        let report = SaptuneApplySolution::build(arguments("HANA"), "op-1", options(stub.clone()))
            .run(&CancellationToken::new())
            .await;

        let success = report.success_outcome().expect("report should succeed");
        assert_eq!(success.last_phase, Phase::Verify);
        assert_eq!(success.diff["before"], r#"{"solution":"HANA"}"#);
        assert_eq!(success.diff["after"], r#"{"solution":"HANA"}"#);
        assert_eq!(stub.apply_calls(), 0);
    }

    #[tokio::test]
    async fn test_apply_solution_happy_path() {
        let stub = Arc::new(StubSaptune::new("3.1.0", ""));
        let report = SaptuneApplySolution::build(arguments("HANA"), "op-1", options(stub.clone()))
            .run(&CancellationToken::new())
            .await;

        let success = report.success_outcome().expect("report should succeed");
        assert_eq!(success.last_phase, Phase::Verify);
        assert_eq!(success.diff["before"], r#"{"solution":""}"#);
        assert_eq!(success.diff["after"], r#"{"solution":"HANA"}"#);
        assert_eq!(stub.apply_calls(), 1);
    }

    #[tokio::test]
    async fn test_apply_solution_conflicting_solution() {
        let stub = Arc::new(StubSaptune::new("3.1.0", "S4HANA-APP"));
        let report = SaptuneApplySolution::build(arguments("HANA"), "op-1", options(stub.clone()))
            .run(&CancellationToken::new())
            .await;

        let error = report.error_outcome().expect("report should fail");
        assert_eq!(error.phase, Phase::Commit);
        assert_eq!(
            error.message,
            "cannot apply solution HANA because another solution S4HANA-APP is already applied"
        );
        assert_eq!(stub.apply_calls(), 0);
    }

    #[tokio::test]
    async fn test_apply_solution_unsupported_version() {
        let stub = Arc::new(StubSaptune::new("3.0.2", ""));
        let report = SaptuneApplySolution::build(arguments("HANA"), "op-1", options(stub))
            .run(&CancellationToken::new())
            .await;

        let error = report.error_outcome().expect("report should fail");
        assert_eq!(error.phase, Phase::Plan);
        assert!(error.message.contains("saptune version not supported"));
    }

    #[tokio::test]
    async fn test_apply_solution_missing_argument() {
        let stub = Arc::new(StubSaptune::new("3.1.0", ""));
        let report = SaptuneApplySolution::build(Arguments::new(), "op-1", options(stub))
            .run(&CancellationToken::new())
            .await;

        let error = report.error_outcome().expect("report should fail");
        assert_eq!(error.phase, Phase::Plan);
        assert_eq!(
            error.message,
            "argument solution not provided, could not use the operator"
        );
    }

    #[tokio::test]
    async fn test_change_solution_replaces_existing() {
        let stub = Arc::new(StubSaptune::new("3.1.0", "S4HANA-APP"));
        let report = SaptuneChangeSolution::build(arguments("HANA"), "op-1", options(stub.clone()))
            .run(&CancellationToken::new())
            .await;

        let success = report.success_outcome().expect("report should succeed");
        assert_eq!(success.last_phase, Phase::Verify);
        assert_eq!(success.diff["before"], r#"{"solution":"S4HANA-APP"}"#);
        assert_eq!(success.diff["after"], r#"{"solution":"HANA"}"#);
        assert_eq!(stub.change_calls(), 1);
        assert_eq!(stub.apply_calls(), 0);
    }

    #[tokio::test]
    async fn test_change_solution_failed_verify_has_no_rollback() {
        let stub = Arc::new(StubSaptune::new("3.1.0", ""));
        stub.fail_mutations();

        let report = SaptuneChangeSolution::build(arguments("HANA"), "op-1", options(stub))
            .run(&CancellationToken::new())
            .await;

        // The commit error surfaces unchanged since rollback is a no-op.
        let error = report.error_outcome().expect("report should fail");
        assert_eq!(error.phase, Phase::Commit);
    }
}
