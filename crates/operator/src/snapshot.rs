//! Typed before/after state capture.

use std::collections::HashMap;

use serde::Serialize;

const BEFORE_FIELD: &str = "before";
const AFTER_FIELD: &str = "after";

/// Before/after holder for an operator's observed state.
///
/// `before` must be recorded no later than the end of Plan; `after` no later
/// than the end of Verify, or at the end of Plan when the already-applied
/// short-circuit fires.
#[derive(Debug, Clone, Default)]
pub struct Snapshot<T> {
    before: Option<T>,
    after: Option<T>,
}

impl<T> Snapshot<T> {
    pub fn new() -> Self {
        Self {
            before: None,
            after: None,
        }
    }

    pub fn record_before(&mut self, state: T) {
        self.before = Some(state);
    }

    pub fn record_after(&mut self, state: T) {
        self.after = Some(state);
    }

    pub fn before(&self) -> Option<&T> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&T> {
        self.after.as_ref()
    }
}

impl<T: Serialize> Snapshot<T> {
    /// Render the diff mapping for the execution report.
    ///
    /// Both fields are JSON encodings of the operator-specific payload; an
    /// unrecorded side renders as an empty string.
    pub fn diff(&self) -> HashMap<String, String> {
        let mut diff = HashMap::new();
        diff.insert(BEFORE_FIELD.to_string(), encode(self.before.as_ref()));
        diff.insert(AFTER_FIELD.to_string(), encode(self.after.as_ref()));
        diff
    }
}

fn encode<T: Serialize>(state: Option<&T>) -> String {
    state
        .and_then(|value| serde_json::to_string(value).ok())
        .unwrap_or_default()
}
