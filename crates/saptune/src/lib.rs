//! # saptune
//!
//! Typed wrapper around the `saptune` CLI.
//!
//! Solutions are named bundles of tuning settings; at most one may be
//! applied on a host at a time. The [`Saptune`] trait exposes the version
//! gate, the applied-solution query and the apply/change/revert mutations;
//! [`SaptuneClient`] shells out through a [`cmdkit::CommandExecutor`].

pub mod client;
pub mod error;

pub use client::{MINIMAL_SAPTUNE_VERSION, Saptune, SaptuneClient};
pub use error::{Error, Result};
