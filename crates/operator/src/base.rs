//! Shared operator state and base options.

use std::sync::Arc;

use cmdkit::{CommandExecutor, SystemExecutor};
use tracing::Span;

use crate::arguments::Arguments;

/// Options shared by every operator builder.
///
/// An explicit record with named optional fields; operators that shell out
/// resolve their executor through [`BaseOptions::executor`], which tests
/// override with a scripted implementation.
#[derive(Clone, Default)]
pub struct BaseOptions {
    /// Command executor override; defaults to the real system executor.
    pub executor: Option<Arc<dyn CommandExecutor>>,
}

impl BaseOptions {
    /// The configured executor, or the system one.
    pub fn executor(&self) -> Arc<dyn CommandExecutor> {
        self.executor
            .clone()
            .unwrap_or_else(|| Arc::new(SystemExecutor))
    }
}

/// State embedded by every concrete operator: the raw arguments, the caller
/// chosen operation id, and a tracing span carrying both.
pub struct BaseOperator {
    operation_id: String,
    arguments: Arguments,
    span: Span,
}

impl BaseOperator {
    pub fn new(operator: &str, operation_id: &str, arguments: Arguments) -> Self {
        let span = tracing::info_span!("operation", operator, operation_id);
        Self {
            operation_id: operation_id.to_string(),
            arguments,
            span,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Span enriched with the operation id; phase work runs inside it so
    /// every log line is attributable.
    pub fn span(&self) -> &Span {
        &self.span
    }
}
