//! saptune CLI client.

use std::sync::Arc;

use async_trait::async_trait;
use cmdkit::{CommandExecutor, SystemExecutor};
use semver::Version;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Minimum saptune version this tool drives safely; older releases lack the
/// JSON output format.
pub const MINIMAL_SAPTUNE_VERSION: &str = "v3.1.0";

/// saptune operations used by the operators.
#[async_trait]
pub trait Saptune: Send + Sync {
    /// Fail when saptune is missing or older than
    /// [`MINIMAL_SAPTUNE_VERSION`].
    async fn check_version_support(&self, token: &CancellationToken) -> Result<()>;

    /// The currently applied solution id, or an empty string when none is
    /// applied.
    async fn get_applied_solution(&self, token: &CancellationToken) -> Result<String>;

    /// `saptune solution apply <solution>`.
    async fn apply_solution(&self, token: &CancellationToken, solution: &str) -> Result<()>;

    /// `saptune solution change --force <solution>`, replacing any applied
    /// solution.
    async fn change_solution(&self, token: &CancellationToken, solution: &str) -> Result<()>;

    /// `saptune solution revert <solution>`.
    async fn revert_solution(&self, token: &CancellationToken, solution: &str) -> Result<()>;
}

/// Default client shelling out to rpm and saptune.
pub struct SaptuneClient {
    executor: Arc<dyn CommandExecutor>,
}

impl SaptuneClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn run_solution_verb(
        &self,
        token: &CancellationToken,
        verb: &'static str,
        args: &[&str],
        solution: &str,
    ) -> Result<()> {
        let result = self.executor.exec(token, "saptune", args).await;

        if let Err(source) = result {
            error!(
                solution,
                verb,
                output = source.output().unwrap_or_default(),
                "saptune solution command failed"
            );
            return Err(Error::SolutionChange {
                verb,
                solution: solution.to_string(),
                source,
            });
        }

        Ok(())
    }
}

impl Default for SaptuneClient {
    fn default() -> Self {
        Self::new(Arc::new(SystemExecutor))
    }
}

#[async_trait]
impl Saptune for SaptuneClient {
    async fn check_version_support(&self, token: &CancellationToken) -> Result<()> {
        let output = self
            .executor
            .exec(token, "rpm", &["-q", "--qf", "%{VERSION}", "saptune"])
            .await
            .map_err(Error::VersionLookup)?;

        let installed = String::from_utf8_lossy(&output).trim().to_string();
        if !version_supported(&installed) {
            return Err(Error::VersionNotSupported {
                installed,
                minimum: MINIMAL_SAPTUNE_VERSION.to_string(),
            });
        }

        debug!(version = %installed, "installed saptune version");
        Ok(())
    }

    async fn get_applied_solution(&self, token: &CancellationToken) -> Result<String> {
        let output = self
            .executor
            .exec(token, "saptune", &["--format", "json", "solution", "applied"])
            .await
            .map_err(Error::SolutionQuery)?;

        let decoded: Value = serde_json::from_slice(&output).map_err(Error::MalformedOutput)?;

        Ok(applied_solution_id(&decoded))
    }

    async fn apply_solution(&self, token: &CancellationToken, solution: &str) -> Result<()> {
        self.run_solution_verb(token, "apply", &["solution", "apply", solution], solution)
            .await
    }

    async fn change_solution(&self, token: &CancellationToken, solution: &str) -> Result<()> {
        self.run_solution_verb(
            token,
            "change",
            &["solution", "change", "--force", solution],
            solution,
        )
        .await
    }

    async fn revert_solution(&self, token: &CancellationToken, solution: &str) -> Result<()> {
        self.run_solution_verb(token, "revert", &["solution", "revert", solution], solution)
            .await
    }
}

/// Semantic-version comparison against the minimum, tolerating a leading
/// `v` on either side. Unparseable versions are unsupported.
fn version_supported(installed: &str) -> bool {
    let minimum = Version::parse(MINIMAL_SAPTUNE_VERSION.trim_start_matches('v'))
        .expect("valid minimum version");

    match Version::parse(installed.trim_start_matches('v')) {
        Ok(version) => version >= minimum,
        Err(_) => false,
    }
}

/// Path into the saptune JSON schema:
/// `result."Solution applied".0."Solution ID"`. Missing means no solution.
fn applied_solution_id(value: &Value) -> String {
    value
        .pointer("/result/Solution applied/0/Solution ID")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
