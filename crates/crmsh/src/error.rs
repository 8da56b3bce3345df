use thiserror::Error;

/// Errors raised by the cluster client.
#[derive(Debug, Error)]
pub enum Error {
    /// `cs_clusterstate -i` could not be executed.
    #[error("error running cs_clusterstate: {0}")]
    ClusterState(#[source] cmdkit::Error),

    #[error("failed to start CRM cluster: {0}")]
    StartCluster(#[source] cmdkit::Error),

    #[error("failed to stop CRM cluster: {0}")]
    StopCluster(#[source] cmdkit::Error),

    #[error("failed to refresh resource: {0}")]
    ResourceRefresh(#[source] cmdkit::Error),

    /// The refresh command exited zero but did not acknowledge the refresh.
    #[error("failed to refresh resource, unexpected output: {0}")]
    UnexpectedRefreshOutput(String),

    /// A node can only be targeted together with a resource.
    #[error("node id cannot be provided without a resource id")]
    NodeWithoutResource,
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;
