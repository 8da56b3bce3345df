//! # cmdkit
//!
//! Cancellation-aware execution of external commands.
//!
//! This crate provides the seam between the operators and the host: a
//! [`CommandExecutor`] trait that runs a program with arguments under a
//! cancellation token and returns its combined stdout/stderr, plus the
//! default [`SystemExecutor`] backed by `tokio::process`.
//!
//! Higher layers depend on the trait only, so tests can script command
//! outputs without touching the host.
//!
//! ## Example
//!
//! ```no_run
//! use cmdkit::{CommandExecutor, SystemExecutor};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> cmdkit::Result<()> {
//! let executor = SystemExecutor;
//! let token = CancellationToken::new();
//! let output = executor.exec(&token, "crm", &["status"]).await?;
//! println!("{}", String::from_utf8_lossy(&output));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;

pub use error::{Error, Result};
pub use executor::{CommandExecutor, SystemExecutor};
