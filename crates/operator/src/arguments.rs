//! Operator argument decoding.
//!
//! Arguments cross the boundary as a free-form JSON object and are parsed
//! into a typed per-operator struct during Plan. Unknown keys are ignored;
//! missing or ill-typed keys fail with stable messages.

use serde_json::Value;
use thiserror::Error;

/// Raw argument mapping as decoded from the caller's JSON object.
pub type Arguments = serde_json::Map<String, Value>;

/// Argument decoding failure, raised during Plan.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("argument {name} not provided, could not use the operator")]
    NotProvided { name: String },

    #[error("could not parse {name} argument as {expected}, argument provided: {value}")]
    Invalid {
        name: String,
        expected: &'static str,
        value: Value,
    },

    #[error("{name} argument is empty")]
    Empty { name: String },
}

/// Typed accessors over the raw argument mapping.
pub trait ArgumentsExt {
    /// A required, non-empty string argument.
    fn required_string(&self, name: &str) -> Result<String, ArgumentError>;

    /// A required boolean argument.
    fn required_bool(&self, name: &str) -> Result<bool, ArgumentError>;

    /// An optional string argument; `Ok(None)` when absent.
    fn optional_string(&self, name: &str) -> Result<Option<String>, ArgumentError>;

    /// An optional numeric argument; `Ok(None)` when absent.
    fn optional_number(&self, name: &str) -> Result<Option<f64>, ArgumentError>;
}

impl ArgumentsExt for Arguments {
    fn required_string(&self, name: &str) -> Result<String, ArgumentError> {
        let value = self.get(name).ok_or_else(|| ArgumentError::NotProvided {
            name: name.to_string(),
        })?;

        let parsed = value.as_str().ok_or_else(|| ArgumentError::Invalid {
            name: name.to_string(),
            expected: "string",
            value: value.clone(),
        })?;

        if parsed.is_empty() {
            return Err(ArgumentError::Empty {
                name: name.to_string(),
            });
        }

        Ok(parsed.to_string())
    }

    fn required_bool(&self, name: &str) -> Result<bool, ArgumentError> {
        let value = self.get(name).ok_or_else(|| ArgumentError::NotProvided {
            name: name.to_string(),
        })?;

        value.as_bool().ok_or_else(|| ArgumentError::Invalid {
            name: name.to_string(),
            expected: "bool",
            value: value.clone(),
        })
    }

    fn optional_string(&self, name: &str) -> Result<Option<String>, ArgumentError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| ArgumentError::Invalid {
                    name: name.to_string(),
                    expected: "string",
                    value: value.clone(),
                }),
        }
    }

    fn optional_number(&self, name: &str) -> Result<Option<f64>, ArgumentError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| ArgumentError::Invalid {
                    name: name.to_string(),
                    expected: "number",
                    value: value.clone(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arguments(value: Value) -> Arguments {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_required_string_present() {
        let args = arguments(json!({"solution": "HANA"}));
        assert_eq!(args.required_string("solution").unwrap(), "HANA");
    }

    #[test]
    fn test_required_string_missing_message() {
        let args = arguments(json!({}));
        let err = args.required_string("solution").unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument solution not provided, could not use the operator"
        );
    }

    #[test]
    fn test_required_string_wrong_type_message() {
        let args = arguments(json!({"solution": 42}));
        let err = args.required_string("solution").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not parse solution argument as string, argument provided: 42"
        );
    }

    #[test]
    fn test_required_string_empty() {
        let args = arguments(json!({"solution": ""}));
        let err = args.required_string("solution").unwrap_err();
        assert_eq!(err.to_string(), "solution argument is empty");
    }

    #[test]
    fn test_required_bool() {
        let args = arguments(json!({"maintenance": true}));
        assert!(args.required_bool("maintenance").unwrap());

        let args = arguments(json!({"maintenance": "yes"}));
        let err = args.required_bool("maintenance").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not parse maintenance argument as bool, argument provided: \"yes\""
        );
    }

    #[test]
    fn test_optional_number() {
        let args = arguments(json!({"timeout": 30}));
        assert_eq!(args.optional_number("timeout").unwrap(), Some(30.0));

        let args = arguments(json!({}));
        assert_eq!(args.optional_number("timeout").unwrap(), None);

        let args = arguments(json!({"timeout": "soon"}));
        assert!(args.optional_number("timeout").is_err());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let args = arguments(json!({"solution": "HANA", "extra": 1}));
        assert!(args.required_string("solution").is_ok());
    }
}
