//! # crmsh
//!
//! Thin wrapper around the `crm` CLI and `cs_clusterstate` for querying and
//! mutating a Pacemaker cluster.
//!
//! The [`Cluster`] trait is the seam operators depend on; the default
//! [`ClusterClient`] shells out through a [`cmdkit::CommandExecutor`], so
//! tests can script every command.

pub mod client;
pub mod error;

pub use client::{Cluster, ClusterClient};
pub use error::{Error, Result};
