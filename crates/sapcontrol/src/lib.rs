//! # sapcontrol
//!
//! Typed client for SAP's per-instance control webservice.
//!
//! `sapcontrol` exposes a SOAP endpoint on a UNIX domain socket derived from
//! the instance number (`/tmp/.sapstream5<inst>13`). The [`SapControl`]
//! trait carries the calls the operators need: start/stop an instance or a
//! whole system, and list process/instance states. [`UdsClient`] is the
//! socket-backed implementation.

pub mod client;
pub mod error;
pub mod soap;
pub mod types;

pub use client::{SapControl, UdsClient};
pub use error::{Error, Result};
pub use types::{OsProcess, StartStopOption, StateColor, SystemInstance};
