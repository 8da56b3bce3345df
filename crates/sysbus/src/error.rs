use thiserror::Error;

/// Errors raised by the systemd connector.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to initialize systemd connector: {0}")]
    Connect(#[source] zbus::Error),

    #[error("failed to enable service {service}: {source}")]
    Enable {
        service: String,
        #[source]
        source: zbus::Error,
    },

    #[error("failed to disable service {service}: {source}")]
    Disable {
        service: String,
        #[source]
        source: zbus::Error,
    },

    #[error("failed to get unit file state for service {service}: {source}")]
    UnitFileState {
        service: String,
        #[source]
        source: zbus::Error,
    },

    #[error("failed to reload service {service}: {source}")]
    Reload {
        service: String,
        #[source]
        source: zbus::Error,
    },

    /// The connector was used after `close`.
    #[error("systemd connection is closed")]
    Closed,

    /// The surrounding operation was cancelled mid-call.
    #[error("systemd request cancelled")]
    Cancelled,
}

/// Result type for systemd operations.
pub type Result<T> = std::result::Result<T, Error>;
