//! CRM cluster start/stop operators.
//!
//! Both operators probe host membership through `crm status`, mutate through
//! `crm cluster start|stop`, and verify with bounded exponential backoff to
//! ride out the time Pacemaker needs to settle.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use crmsh::{Cluster, ClusterClient};
use operator::{
    Arguments, ArgumentsExt, BaseOperator, BaseOptions, Backoff, Executor, Phaser, PlanOutcome,
    Snapshot,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const CRM_CLUSTER_START: &str = "crmclusterstart";
pub const CRM_CLUSTER_STOP: &str = "crmclusterstop";

/// Options shared by the cluster start/stop operators.
#[derive(Default)]
pub struct CrmClusterOptions {
    pub base: BaseOptions,
    /// Cluster client override; defaults to crmsh on the base executor.
    pub cluster: Option<Arc<dyn Cluster>>,
    /// Backoff override for the verify and rollback probes.
    pub backoff: Option<Backoff>,
}

impl CrmClusterOptions {
    fn split(self) -> (Arc<dyn Cluster>, Backoff) {
        let cluster = match self.cluster {
            Some(cluster) => cluster,
            None => Arc::new(ClusterClient::new(self.base.executor())),
        };
        (cluster, self.backoff.unwrap_or_default())
    }
}

struct ClusterArguments {
    cluster_id: String,
}

fn parse_cluster_arguments(arguments: &Arguments) -> Result<ClusterArguments> {
    Ok(ClusterArguments {
        cluster_id: arguments.required_string("cluster_id")?,
    })
}

#[derive(Debug, Clone, Serialize)]
struct StartedState {
    started: bool,
}

#[derive(Debug, Clone, Serialize)]
struct StoppedState {
    stopped: bool,
}

/// Starts the CRM cluster on this host.
///
/// Plan short-circuits when the host is already online. Verify retries the
/// online probe with backoff; Rollback retries `crm cluster stop` the same
/// way.
pub struct CrmClusterStart {
    base: BaseOperator,
    cluster: Arc<dyn Cluster>,
    backoff: Backoff,
    parsed: Option<ClusterArguments>,
    snapshot: Snapshot<StartedState>,
}

impl CrmClusterStart {
    pub fn build(arguments: Arguments, operation_id: &str, options: CrmClusterOptions) -> Executor {
        let (cluster, backoff) = options.split();
        let phaser = Self {
            base: BaseOperator::new(CRM_CLUSTER_START, operation_id, arguments),
            cluster,
            backoff,
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }
}

#[async_trait]
impl Phaser for CrmClusterStart {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let parsed = parse_cluster_arguments(self.base.arguments())?;

        let online = self.cluster.is_host_online(token).await;
        self.snapshot.record_before(StartedState { started: online });

        if online {
            self.base.span().in_scope(|| {
                info!(
                    cluster_id = %parsed.cluster_id,
                    "CRM cluster is already online, skipping start operation"
                );
            });
            self.parsed = Some(parsed);
            self.snapshot.record_after(StartedState { started: true });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        self.base.span().in_scope(|| {
            info!(
                cluster_id = %parsed.cluster_id,
                "CRM cluster is offline, will attempt to start it"
            );
        });
        self.parsed = Some(parsed);
        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        if let Some(parsed) = &self.parsed {
            self.base.span().in_scope(|| {
                info!(cluster_id = %parsed.cluster_id, "starting CRM cluster");
            });
        }

        self.cluster
            .start_cluster(token)
            .await
            .context("error starting CRM cluster")
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let cluster = self.cluster.clone();
        let probe_token = token.clone();
        self.backoff
            .retry(token, || async {
                if cluster.is_host_online(&probe_token).await {
                    Ok(())
                } else {
                    bail!("CRM cluster is not online, expected online state")
                }
            })
            .await
            .context("error verifying CRM cluster start")?;

        self.snapshot.record_after(StartedState { started: true });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        let cluster = self.cluster.clone();
        let probe_token = token.clone();
        self.backoff
            .retry(token, || async {
                cluster.stop_cluster(&probe_token).await?;
                Ok(())
            })
            .await
            .context("error rolling back CRM cluster start")
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}

/// Stops the CRM cluster on this host; symmetric to [`CrmClusterStart`].
pub struct CrmClusterStop {
    base: BaseOperator,
    cluster: Arc<dyn Cluster>,
    backoff: Backoff,
    parsed: Option<ClusterArguments>,
    snapshot: Snapshot<StoppedState>,
}

impl CrmClusterStop {
    pub fn build(arguments: Arguments, operation_id: &str, options: CrmClusterOptions) -> Executor {
        let (cluster, backoff) = options.split();
        let phaser = Self {
            base: BaseOperator::new(CRM_CLUSTER_STOP, operation_id, arguments),
            cluster,
            backoff,
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }
}

#[async_trait]
impl Phaser for CrmClusterStop {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let parsed = parse_cluster_arguments(self.base.arguments())?;

        let online = self.cluster.is_host_online(token).await;
        self.snapshot.record_before(StoppedState { stopped: !online });

        if !online {
            self.base.span().in_scope(|| {
                info!(
                    cluster_id = %parsed.cluster_id,
                    "CRM cluster is already offline, skipping stop operation"
                );
            });
            self.parsed = Some(parsed);
            self.snapshot.record_after(StoppedState { stopped: true });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        self.parsed = Some(parsed);
        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        if let Some(parsed) = &self.parsed {
            self.base.span().in_scope(|| {
                info!(cluster_id = %parsed.cluster_id, "stopping CRM cluster");
            });
        }

        self.cluster
            .stop_cluster(token)
            .await
            .context("error stopping CRM cluster")
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let cluster = self.cluster.clone();
        let probe_token = token.clone();
        self.backoff
            .retry(token, || async {
                if cluster.is_host_online(&probe_token).await {
                    bail!("CRM cluster is still online, expected offline state")
                } else {
                    Ok(())
                }
            })
            .await
            .context("error verifying CRM cluster stop")?;

        self.snapshot.record_after(StoppedState { stopped: true });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        let cluster = self.cluster.clone();
        let probe_token = token.clone();
        self.backoff
            .retry(token, || async {
                cluster.start_cluster(&probe_token).await?;
                Ok(())
            })
            .await
            .context("error rolling back CRM cluster stop")
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}
