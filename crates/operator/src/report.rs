//! Terminal value of every operator execution.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::phase::Phase;

/// Successful outcome: the last phase reached and the before/after diff.
///
/// `last_phase` is [`Phase::Plan`] only when Plan declared the desired state
/// already applied; otherwise it is [`Phase::Verify`].
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSuccess {
    pub last_phase: Phase,
    pub diff: HashMap<String, String>,
}

/// Failed outcome: the phase that last attempted work and a human-readable
/// message.
///
/// The phase is [`Phase::Rollback`] only when both a forward phase and the
/// rollback failed; the message then joins the rollback error first, a
/// newline, then the original error.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionError {
    pub phase: Phase,
    pub message: String,
}

/// Exactly one of success or error; the two cannot coexist.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success(ExecutionSuccess),
    Error(ExecutionError),
}

/// Report returned by every `run`, tagged with the caller-chosen operation id.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub operation_id: String,
    pub outcome: ExecutionOutcome,
}

impl Serialize for ExecutionReport {
    /// Renders `{ operation_id, success: {...} }` or
    /// `{ operation_id, error: {...} }`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("operation_id", &self.operation_id)?;
        match &self.outcome {
            ExecutionOutcome::Success(success) => map.serialize_entry("success", success)?,
            ExecutionOutcome::Error(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

impl ExecutionReport {
    /// Build a success report.
    pub fn success(
        operation_id: impl Into<String>,
        last_phase: Phase,
        diff: HashMap<String, String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            outcome: ExecutionOutcome::Success(ExecutionSuccess { last_phase, diff }),
        }
    }

    /// Build an error report.
    pub fn error(
        operation_id: impl Into<String>,
        phase: Phase,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            outcome: ExecutionOutcome::Error(ExecutionError {
                phase,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Success(_))
    }

    /// The success payload, if the run succeeded.
    pub fn success_outcome(&self) -> Option<&ExecutionSuccess> {
        match &self.outcome {
            ExecutionOutcome::Success(success) => Some(success),
            ExecutionOutcome::Error(_) => None,
        }
    }

    /// The error payload, if the run failed.
    pub fn error_outcome(&self) -> Option<&ExecutionError> {
        match &self.outcome {
            ExecutionOutcome::Success(_) => None,
            ExecutionOutcome::Error(error) => Some(error),
        }
    }
}
