use std::fmt;

use serde::Serialize;

/// Lifecycle phase of an operator execution.
///
/// The executor exclusively owns the phase progression; phasers only see it
/// again in the report they caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Plan,
    Commit,
    Verify,
    Rollback,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Phase::Plan => "PLAN",
            Phase::Commit => "COMMIT",
            Phase::Verify => "VERIFY",
            Phase::Rollback => "ROLLBACK",
        };
        write!(f, "{tag}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_uppercase_tags() {
        assert_eq!(Phase::Plan.to_string(), "PLAN");
        assert_eq!(Phase::Rollback.to_string(), "ROLLBACK");
    }
}
