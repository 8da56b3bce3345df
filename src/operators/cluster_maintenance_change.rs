//! Cluster maintenance operator.
//!
//! Changes the Pacemaker maintenance state at cluster, resource or node
//! scope through crmsh. Reads and writes use different crm commands per
//! scope; see the helpful references on maintenance transitions:
//!
//! - <https://crmsh.github.io/man-4.6/#cmdhelp_maintenance>
//! - <https://crmsh.github.io/man-4.6/#cmdhelp_resource>
//! - <https://clusterlabs.org/projects/pacemaker/doc/2.1/Pacemaker_Explained/html/resources.html#resource-meta-attributes>

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use cmdkit::CommandExecutor;
use crmsh::{Cluster, ClusterClient};
use operator::{
    Arguments, ArgumentsExt, BaseOperator, BaseOptions, Executor, Phaser, PlanOutcome, Snapshot,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const CLUSTER_MAINTENANCE_CHANGE: &str = "clustermaintenancechange";

const MAINTENANCE_ON: &str = "on";
const MAINTENANCE_OFF: &str = "off";

/// Options for [`ClusterMaintenanceChange`].
#[derive(Default)]
pub struct ClusterMaintenanceChangeOptions {
    pub base: BaseOptions,
    /// Cluster client override; defaults to crmsh on the base executor.
    pub cluster: Option<Arc<dyn Cluster>>,
}

/// Maintenance target derived from the arguments in Plan.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Cluster,
    Resource(String),
    Node(String),
}

impl Scope {
    fn resource_id(&self) -> Option<&str> {
        match self {
            Scope::Resource(id) => Some(id),
            _ => None,
        }
    }

    fn node_id(&self) -> Option<&str> {
        match self {
            Scope::Node(id) => Some(id),
            _ => None,
        }
    }
}

struct MaintenanceArguments {
    maintenance: bool,
    scope: Scope,
}

#[derive(Debug, Clone, Serialize)]
struct MaintenanceState {
    maintenance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_id: Option<String>,
}

/// Puts the cluster, one resource, or one node into or out of maintenance.
///
/// Plan requires the host to be online and short-circuits when the desired
/// state already holds. Commit requires the cluster to be idle and, when
/// leaving maintenance, refreshes the resource state first. Rollback writes
/// the captured `before` state back, again behind the idle guard.
pub struct ClusterMaintenanceChange {
    base: BaseOperator,
    executor: Arc<dyn CommandExecutor>,
    cluster: Arc<dyn Cluster>,
    parsed: Option<MaintenanceArguments>,
    snapshot: Snapshot<MaintenanceState>,
}

impl ClusterMaintenanceChange {
    pub fn build(
        arguments: Arguments,
        operation_id: &str,
        options: ClusterMaintenanceChangeOptions,
    ) -> Executor {
        let executor = options.base.executor();
        let cluster = match options.cluster {
            Some(cluster) => cluster,
            None => Arc::new(ClusterClient::new(executor.clone())),
        };

        let phaser = Self {
            base: BaseOperator::new(CLUSTER_MAINTENANCE_CHANGE, operation_id, arguments),
            executor,
            cluster,
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }

    fn parsed(&self) -> &MaintenanceArguments {
        self.parsed
            .as_ref()
            .expect("arguments parsed during plan")
    }

    fn state(&self, maintenance: bool) -> MaintenanceState {
        let scope = &self.parsed().scope;
        MaintenanceState {
            maintenance,
            resource_id: scope.resource_id().map(str::to_string),
            node_id: scope.node_id().map(str::to_string),
        }
    }

    async fn read_state(&self, token: &CancellationToken) -> Result<bool> {
        match &self.parsed().scope {
            Scope::Cluster => {
                let output = self
                    .executor
                    .exec(
                        token,
                        "crm",
                        &["configure", "get_property", "-t", "maintenance-mode"],
                    )
                    .await
                    .context("error getting maintenance-mode")?;

                parse_state_output(&output).context("error decoding maintenance-mode attribute")
            }
            Scope::Resource(resource_id) => self.read_resource_state(token, resource_id).await,
            Scope::Node(node_id) => {
                let output = self
                    .executor
                    .exec(
                        token,
                        "crm",
                        &["node", "attribute", node_id, "show", "maintenance"],
                    )
                    .await
                    .context("error getting node maintenance attribute")?;

                Ok(parse_node_attribute(&String::from_utf8_lossy(&output)))
            }
        }
    }

    /// The resource `maintenance` meta attribute wins over `is-managed`;
    /// is-managed carries the opposite logic. Neither attribute found means
    /// not in maintenance.
    async fn read_resource_state(
        &self,
        token: &CancellationToken,
        resource_id: &str,
    ) -> Result<bool> {
        let output = self
            .executor
            .exec(
                token,
                "crm",
                &["resource", "meta", resource_id, "show", "maintenance"],
            )
            .await
            .context("error getting maintenance attribute")?;

        if !String::from_utf8_lossy(&output).contains("not found") {
            return parse_state_output(&output).context("error decoding maintenance attribute");
        }

        let output = self
            .executor
            .exec(
                token,
                "crm",
                &["resource", "meta", resource_id, "show", "is-managed"],
            )
            .await
            .context("error getting is-managed attribute")?;

        if String::from_utf8_lossy(&output).contains("not found") {
            return Ok(false);
        }

        let is_managed =
            parse_state_output(&output).context("error decoding is-managed attribute")?;
        Ok(!is_managed)
    }

    async fn write_state(&self, token: &CancellationToken, maintenance: bool) -> Result<()> {
        match &self.parsed().scope {
            Scope::Node(node_id) => {
                let action = if maintenance { "maintenance" } else { "ready" };
                self.executor
                    .exec(token, "crm", &["--force", "node", action, node_id])
                    .await?;
            }
            Scope::Cluster => {
                let state = maintenance_state_string(maintenance);
                self.executor
                    .exec(token, "crm", &["maintenance", state])
                    .await?;
            }
            Scope::Resource(resource_id) => {
                let state = maintenance_state_string(maintenance);
                self.executor
                    .exec(token, "crm", &["maintenance", state, resource_id])
                    .await?;
            }
        }
        Ok(())
    }

    async fn ensure_idle(&self, token: &CancellationToken) -> Result<()> {
        if !self.cluster.is_idle(token).await? {
            bail!("cluster is not in S_IDLE state");
        }
        Ok(())
    }
}

#[async_trait]
impl Phaser for ClusterMaintenanceChange {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        self.parsed = Some(parse_maintenance_arguments(self.base.arguments())?);

        if !self.cluster.is_host_online(token).await {
            bail!("cluster is not online on this host");
        }

        let current = self.read_state(token).await?;
        self.snapshot.record_before(self.state(current));

        if current == self.parsed().maintenance {
            self.base.span().in_scope(|| {
                info!(maintenance = current, "maintenance state already set, skipping operation");
            });
            self.snapshot.record_after(self.state(current));
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        self.ensure_idle(token).await?;

        // Refresh before removing the maintenance state so Pacemaker
        // reconciles with the actual resource status.
        if !self.parsed().maintenance {
            let resource_id = self.parsed().scope.resource_id().map(str::to_string);
            self.cluster
                .resource_refresh(token, resource_id.as_deref(), None)
                .await?;
        }

        self.write_state(token, self.parsed().maintenance)
            .await
            .context("error updating maintenance state")
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let current = self.read_state(token).await?;

        if current != self.parsed().maintenance {
            bail!(
                "verify cluster maintenance failed, the maintenance value {} was not set in commit phase",
                self.parsed().maintenance
            );
        }

        self.snapshot.record_after(self.state(current));
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        self.ensure_idle(token).await?;

        let initial = self
            .snapshot
            .before()
            .map(|state| state.maintenance)
            .unwrap_or_default();

        self.write_state(token, initial)
            .await
            .context("error rolling back maintenance state")
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}

fn parse_maintenance_arguments(arguments: &Arguments) -> Result<MaintenanceArguments> {
    let maintenance = arguments.required_bool("maintenance")?;
    let resource_id = arguments.optional_string("resource_id")?;
    let node_id = arguments.optional_string("node_id")?;

    let scope = match (resource_id, node_id) {
        (Some(_), Some(_)) => bail!(
            "resource_id and node_id arguments are mutually exclusive, only one of them can be provided"
        ),
        (Some(resource_id), None) => Scope::Resource(resource_id),
        (None, Some(node_id)) => Scope::Node(node_id),
        (None, None) => Scope::Cluster,
    };

    Ok(MaintenanceArguments { maintenance, scope })
}

fn maintenance_state_string(maintenance: bool) -> &'static str {
    if maintenance {
        MAINTENANCE_ON
    } else {
        MAINTENANCE_OFF
    }
}

/// Depending on the queried resource, crm prints debug lines before the
/// actual attribute value, so only the last line is parsed. Example:
///
/// ```text
/// msl_SAPHana_PRD_HDB00 is active on more than one node, returning the default value for maintenance
/// false
/// ```
fn parse_state_output(output: &[u8]) -> Result<bool> {
    let trimmed = String::from_utf8_lossy(output).trim().to_string();
    if trimmed.is_empty() {
        bail!("empty command output");
    }

    let last_line = trimmed.lines().last().unwrap_or_default().trim();
    last_line
        .parse()
        .map_err(|_| anyhow!("invalid boolean value: {last_line}"))
}

/// Node attributes print as `scope=nodes name=maintenance value=<v>`; only
/// the literal `true` means in maintenance. `off`, `(null)` and a missing
/// attribute all mean not in maintenance.
fn parse_node_attribute(output: &str) -> bool {
    output
        .split_whitespace()
        .filter_map(|token| token.strip_prefix("value="))
        .next_back()
        == Some("true")
}
