use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the sapcontrol client.
#[derive(Debug, Error)]
pub enum Error {
    /// The instance socket could not be reached.
    #[error("could not connect to sapcontrol socket {socket}: {source}")]
    Connect {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request or response failed on the wire.
    #[error("sapcontrol transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The webservice answered with a SOAP fault.
    #[error("sapcontrol fault: {0}")]
    Fault(String),

    /// The response could not be parsed against the expected shape.
    #[error("unexpected sapcontrol response: {0}")]
    UnexpectedResponse(String),

    /// The surrounding operation was cancelled mid-call.
    #[error("sapcontrol request cancelled")]
    Cancelled,
}

/// Result type for sapcontrol operations.
pub type Result<T> = std::result::Result<T, Error>;
