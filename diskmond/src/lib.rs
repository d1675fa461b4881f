//! diskmond library crate.
//!
//! Decides when to re-check disk space usage and relays the results onto the
//! system bus. The scheduling core is reachable from integration tests.

pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod probe;
pub mod relay;
pub mod scheduler;
pub mod service;

pub use error::{Error, Result};
