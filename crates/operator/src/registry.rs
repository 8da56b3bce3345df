//! Name-versioned table of operator builders.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::arguments::Arguments;
use crate::executor::Executor;

/// Builds an [`Executor`] for one operator version from an operation id and
/// the raw argument mapping.
pub type OperatorBuilder = Box<dyn Fn(&str, Arguments) -> Executor + Send + Sync>;

/// Registry resolution failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("operator {name} not found")]
    NotFound { name: String },

    #[error(
        "could not extract the operator version from {spec}, version should follow <operatorName>@<version> syntax"
    )]
    MalformedSpec { spec: String },
}

/// Read-only after construction; safe to share across concurrent callers.
///
/// Keys are unique per (name, version). Version strings sort
/// lexicographically and "latest" resolution returns the largest under that
/// order.
#[derive(Default)]
pub struct Registry {
    operators: BTreeMap<String, BTreeMap<String, OperatorBuilder>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder under (name, version), replacing any previous one.
    pub fn register(&mut self, name: &str, version: &str, builder: OperatorBuilder) {
        self.operators
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string(), builder);
    }

    /// Resolve a builder from `name` (latest version) or `name@version`.
    pub fn get_builder(&self, spec: &str) -> Result<&OperatorBuilder, RegistryError> {
        let (name, version) = parse_spec(spec)?;

        let versions = self
            .operators
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: spec.to_string(),
            })?;

        let builder = match version {
            Some(version) => versions.get(version),
            // BTreeMap iteration is ascending, so the last entry is the
            // lexicographic maximum.
            None => versions.last_key_value().map(|(_, builder)| builder),
        };

        builder.ok_or_else(|| RegistryError::NotFound {
            name: spec.to_string(),
        })
    }

    /// Diagnostic enumeration: one line per operator, versions joined by
    /// `/`, sorted by operator name.
    pub fn available(&self) -> Vec<String> {
        self.operators
            .iter()
            .map(|(name, versions)| {
                let versions: Vec<&str> = versions.keys().map(String::as_str).collect();
                format!("{} - {}", name, versions.join("/"))
            })
            .collect()
    }
}

fn parse_spec(spec: &str) -> Result<(&str, Option<&str>), RegistryError> {
    let parts: Vec<&str> = spec.split('@').collect();
    match parts.as_slice() {
        [name] => Ok((name, None)),
        [name, version] => Ok((name, Some(version))),
        _ => Err(RegistryError::MalformedSpec {
            spec: spec.to_string(),
        }),
    }
}
