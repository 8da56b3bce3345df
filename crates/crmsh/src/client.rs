//! Cluster client over crm / cs_clusterstate.

use std::sync::Arc;

use async_trait::async_trait;
use cmdkit::{CommandExecutor, SystemExecutor};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Substring printed by crmsh when a resource refresh was acknowledged.
const RESOURCE_REFRESHED_MESSAGE: &str = "got reply (done)";

/// Pacemaker's "no transitions in flight" state.
const CLUSTER_IDLE_PATTERN: &str = "S_IDLE";

/// Cluster operations used by the operators.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Whether the local host participates in a running cluster.
    ///
    /// Probed through `crm status`; any failure means offline.
    async fn is_host_online(&self, token: &CancellationToken) -> bool;

    /// Whether the cluster is in `S_IDLE` state.
    async fn is_idle(&self, token: &CancellationToken) -> Result<bool>;

    async fn start_cluster(&self, token: &CancellationToken) -> Result<()>;

    async fn stop_cluster(&self, token: &CancellationToken) -> Result<()>;

    /// Run `crm resource refresh [<resource> [<node>]]`.
    ///
    /// A node requires a resource. The command may exit zero without doing
    /// anything, so success is confirmed by the tool's reply marker in the
    /// output.
    async fn resource_refresh(
        &self,
        token: &CancellationToken,
        resource_id: Option<&str>,
        node_id: Option<&str>,
    ) -> Result<()>;
}

/// Default client shelling out to crmsh.
pub struct ClusterClient {
    executor: Arc<dyn CommandExecutor>,
    idle_pattern: Regex,
}

impl ClusterClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            idle_pattern: Regex::new(CLUSTER_IDLE_PATTERN).expect("valid idle pattern"),
        }
    }
}

impl Default for ClusterClient {
    fn default() -> Self {
        Self::new(Arc::new(SystemExecutor))
    }
}

#[async_trait]
impl Cluster for ClusterClient {
    async fn is_host_online(&self, token: &CancellationToken) -> bool {
        match self.executor.exec(token, "crm", &["status"]).await {
            Ok(output) => {
                debug!(output = %String::from_utf8_lossy(&output), "crm status output");
                true
            }
            Err(_) => false,
        }
    }

    async fn is_idle(&self, token: &CancellationToken) -> Result<bool> {
        let output = self
            .executor
            .exec(token, "cs_clusterstate", &["-i"])
            .await
            .map_err(Error::ClusterState)?;

        Ok(self
            .idle_pattern
            .is_match(&String::from_utf8_lossy(&output)))
    }

    async fn start_cluster(&self, token: &CancellationToken) -> Result<()> {
        info!("starting CRM cluster");
        self.executor
            .exec(token, "crm", &["cluster", "start"])
            .await
            .map_err(Error::StartCluster)?;

        info!("CRM cluster started successfully");
        Ok(())
    }

    async fn stop_cluster(&self, token: &CancellationToken) -> Result<()> {
        info!("stopping CRM cluster");
        self.executor
            .exec(token, "crm", &["cluster", "stop"])
            .await
            .map_err(Error::StopCluster)?;

        info!("CRM cluster stopped successfully");
        Ok(())
    }

    async fn resource_refresh(
        &self,
        token: &CancellationToken,
        resource_id: Option<&str>,
        node_id: Option<&str>,
    ) -> Result<()> {
        if node_id.is_some() && resource_id.is_none() {
            return Err(Error::NodeWithoutResource);
        }

        let mut args = vec!["resource", "refresh"];
        if let Some(resource) = resource_id {
            args.push(resource);
            if let Some(node) = node_id {
                args.push(node);
            }
        }

        info!(resource_id, node_id, "refreshing cluster resource");
        let output = self
            .executor
            .exec(token, "crm", &args)
            .await
            .map_err(Error::ResourceRefresh)?;

        let output = String::from_utf8_lossy(&output);
        if !output.contains(RESOURCE_REFRESHED_MESSAGE) {
            return Err(Error::UnexpectedRefreshOutput(output.to_string()));
        }

        info!("cluster resource refreshed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Executor stub replaying queued responses and recording command lines.
    struct ScriptedExecutor {
        responses: Mutex<VecDeque<cmdkit::Result<Vec<u8>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(responses: Vec<cmdkit::Result<Vec<u8>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn exec(
            &self,
            _token: &CancellationToken,
            program: &str,
            args: &[&str],
        ) -> cmdkit::Result<Vec<u8>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{program} {}", args.join(" ")));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected command invocation")
        }
    }

    fn failed(program: &str) -> cmdkit::Error {
        cmdkit::Error::NonZeroExit {
            program: program.into(),
            code: 1,
            output: "failed".into(),
        }
    }

    #[tokio::test]
    async fn test_is_host_online() {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(b"Cluster Summary".to_vec())]));
        let client = ClusterClient::new(executor.clone());

        assert!(client.is_host_online(&CancellationToken::new()).await);
        assert_eq!(executor.calls(), vec!["crm status"]);
    }

    #[tokio::test]
    async fn test_is_host_online_failure_means_offline() {
        let executor = Arc::new(ScriptedExecutor::new(vec![Err(failed("crm"))]));
        let client = ClusterClient::new(executor);

        assert!(!client.is_host_online(&CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_is_idle_matches_state() {
        let executor = Arc::new(ScriptedExecutor::new(vec![
            Ok(b"Cluster state: S_IDLE".to_vec()),
            Ok(b"Cluster state: S_TRANSITION_ENGINE".to_vec()),
        ]));
        let client = ClusterClient::new(executor.clone());
        let token = CancellationToken::new();

        assert!(client.is_idle(&token).await.unwrap());
        assert!(!client.is_idle(&token).await.unwrap());
        assert_eq!(
            executor.calls(),
            vec!["cs_clusterstate -i", "cs_clusterstate -i"]
        );
    }

    #[tokio::test]
    async fn test_start_cluster_maps_failure() {
        let executor = Arc::new(ScriptedExecutor::new(vec![Err(failed("crm"))]));
        let client = ClusterClient::new(executor);

        let err = client
            .start_cluster(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to start CRM cluster"));
    }

    #[tokio::test]
    async fn test_resource_refresh_requires_reply_marker() {
        let executor = Arc::new(ScriptedExecutor::new(vec![
            Ok(b"Cleaning up rsc on node1, removing fail-count-rsc\n... got reply (done)\n".to_vec()),
            Ok(b"nothing to do".to_vec()),
        ]));
        let client = ClusterClient::new(executor.clone());
        let token = CancellationToken::new();

        client
            .resource_refresh(&token, Some("rsc"), Some("node1"))
            .await
            .unwrap();
        let err = client
            .resource_refresh(&token, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedRefreshOutput(_)));

        assert_eq!(
            executor.calls(),
            vec!["crm resource refresh rsc node1", "crm resource refresh"]
        );
    }

    #[tokio::test]
    async fn test_resource_refresh_rejects_node_without_resource() {
        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let client = ClusterClient::new(executor);

        let err = client
            .resource_refresh(&CancellationToken::new(), None, Some("node1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NodeWithoutResource));
    }
}
