//! `workbench execute` subcommand.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use operator::{Arguments, BaseOptions, ExecutionOutcome};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::registry::standard_registry;

/// Decode the argument object, resolve the operator and drive it to its
/// terminal report. Returns an error (non-zero exit) when the run failed.
pub async fn run(operator_spec: &str, raw_arguments: &str) -> Result<()> {
    let arguments: Arguments = serde_json::from_str(raw_arguments)
        .with_context(|| format!("could not decode {raw_arguments} as a JSON argument object"))?;

    let registry = standard_registry(BaseOptions::default());
    let builder = registry.get_builder(operator_spec)?;

    let operation_id = Uuid::new_v4().to_string();
    info!(operator = operator_spec, operation_id = %operation_id, "starting execution");

    // Ctrl-C cancels the in-flight phase; the engine then rolls back and
    // still runs the after hook.
    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let report = builder(&operation_id, arguments).run(&token).await;

    match &report.outcome {
        ExecutionOutcome::Success(success) => {
            println!(
                "{} operation {} succeeded in phase {}",
                "✓".green().bold(),
                report.operation_id,
                success.last_phase
            );
            println!("  before: {}", success.diff.get("before").map(String::as_str).unwrap_or_default());
            println!("  after:  {}", success.diff.get("after").map(String::as_str).unwrap_or_default());
            Ok(())
        }
        ExecutionOutcome::Error(error) => {
            eprintln!(
                "{} operation {} failed in phase {}",
                "✗".red().bold(),
                report.operation_id,
                error.phase
            );
            bail!(
                "operation execution error, phase: {}, reason: {}",
                error.phase,
                error.message
            )
        }
    }
}
