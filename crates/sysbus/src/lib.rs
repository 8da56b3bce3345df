//! # sysbus
//!
//! Narrow systemd connector over the system D-Bus.
//!
//! Only the unit-file operations the operators need are exposed:
//! enable/disable (followed by a daemon reload), the enabled probe, and a
//! deterministic close. Connections are created lazily through a
//! [`SystemdLoader`] so operators can defer the bus round-trip to Plan and
//! tests can inject a scripted connector.

pub mod connector;
pub mod error;

pub use connector::{BusConnector, BusLoader, Systemd, SystemdLoader};
pub use error::{Error, Result};
