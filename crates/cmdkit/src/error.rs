use thiserror::Error;

/// Errors that can occur while executing an external command.
#[derive(Debug, Error)]
pub enum Error {
    /// The program could not be spawned at all (not found, permissions, ...)
    #[error("could not spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited with a non-zero code.
    ///
    /// The combined output is carried along so callers can surface the
    /// tool's own diagnostics.
    #[error("{program} exited with code {code}: {output}")]
    NonZeroExit {
        program: String,
        code: i32,
        output: String,
    },

    /// The program was terminated by a signal before exiting.
    #[error("{program} was terminated by a signal")]
    Terminated { program: String },

    /// The surrounding operation was cancelled while the command ran.
    #[error("{program} execution cancelled")]
    Cancelled { program: String },
}

impl Error {
    /// Returns true if the command was interrupted by cancellation rather
    /// than failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Combined output of the failed command, when one was captured.
    pub fn output(&self) -> Option<&str> {
        match self {
            Error::NonZeroExit { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, Error>;
