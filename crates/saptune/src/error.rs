use thiserror::Error;

/// Errors raised by the saptune client.
#[derive(Debug, Error)]
pub enum Error {
    /// The installed version could not be read from the package database.
    #[error("could not get the installed saptune version: {0}")]
    VersionLookup(#[source] cmdkit::Error),

    /// The installed version predates the minimum this tool drives safely.
    #[error(
        "saptune version not supported, installed: {installed}, minimum supported: {minimum}"
    )]
    VersionNotSupported { installed: String, minimum: String },

    #[error("could not call saptune solution applied: {0}")]
    SolutionQuery(#[source] cmdkit::Error),

    /// `saptune --format json` returned something that is not JSON.
    #[error("could not decode saptune output: {0}")]
    MalformedOutput(#[source] serde_json::Error),

    #[error("could not perform saptune {verb} solution {solution}: {source}")]
    SolutionChange {
        verb: &'static str,
        solution: String,
        #[source]
        source: cmdkit::Error,
    },
}

/// Result type for saptune operations.
pub type Result<T> = std::result::Result<T, Error>;
