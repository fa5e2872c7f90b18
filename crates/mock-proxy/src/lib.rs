//! Record/replay HTTP mock proxy.
//!
//! Requests addressed through a configured mapping are answered from a
//! `.mock` file when one exists, otherwise forwarded to the real API and the
//! successful response is recorded for next time.

pub mod config;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod recording;
pub mod routing;
