//! # operator
//!
//! A framework for phased, idempotent host mutations.
//!
//! Every mutation is an operator exposing a uniform lifecycle (Plan,
//! Commit, Verify, Rollback) driven by a phased [`Executor`] that always
//! returns an [`ExecutionReport`] with a before/after diff.
//!
//! ## Core Concepts
//!
//! - **Phaser**: the contract every operator satisfies; Plan probes current
//!   state and may short-circuit when the desired state already holds
//! - **Executor**: drives Plan → Commit → Verify, composes rollback on
//!   failure, and always runs the `after` hook exactly once
//! - **Registry**: name-versioned table of operator builders with
//!   `name@version` resolution and a latest fallback
//! - **Snapshot**: typed before/after holder rendered into the report diff
//! - **Backoff**: bounded exponential retry with cancellation-aware sleep
//!
//! ## Example
//!
//! ```ignore
//! use operator::{Executor, Phaser, PlanOutcome, Snapshot};
//! use tokio_util::sync::CancellationToken;
//!
//! struct TouchFile { path: String, snapshot: Snapshot<bool> }
//!
//! #[async_trait::async_trait]
//! impl Phaser for TouchFile {
//!     async fn plan(&mut self, _: &CancellationToken) -> anyhow::Result<PlanOutcome> {
//!         let exists = std::path::Path::new(&self.path).exists();
//!         self.snapshot.record_before(exists);
//!         if exists {
//!             self.snapshot.record_after(exists);
//!             return Ok(PlanOutcome::AlreadyApplied);
//!         }
//!         Ok(PlanOutcome::MutationRequired)
//!     }
//!     // commit / verify / rollback / operation_diff elided
//! }
//!
//! let executor = Executor::new(Box::new(phaser), "operation-1");
//! let report = executor.run(&CancellationToken::new()).await;
//! assert!(report.is_success());
//! ```

pub mod arguments;
pub mod base;
pub mod executor;
pub mod phase;
pub mod phaser;
pub mod registry;
pub mod report;
pub mod retry;
pub mod snapshot;

pub use arguments::{Arguments, ArgumentError, ArgumentsExt};
pub use base::{BaseOperator, BaseOptions};
pub use executor::Executor;
pub use phase::Phase;
pub use phaser::{Phaser, PlanOutcome};
pub use registry::{OperatorBuilder, Registry, RegistryError};
pub use report::{ExecutionError, ExecutionOutcome, ExecutionReport, ExecutionSuccess};
pub use retry::{Backoff, sleep_cancellable};
pub use snapshot::Snapshot;
