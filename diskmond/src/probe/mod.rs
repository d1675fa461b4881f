//! Disk usage probing.
//!
//! The scheduler only decides *when* to probe. A [`DiskProber`] performs the
//! scan and pushes zero or more [`ProbeResult`]s into a [`ProbeSink`]; the
//! results are consumed later and independently by the relay, so triggering
//! a probe never waits for its results to be delivered.

mod system;
mod usage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

pub use system::SysinfoProber;
pub use usage::{DiskSpaceState, MountUsage, UsageEvaluator, UsageLimit, default_usage_limits};

/// Usage of one mount point, produced by a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub mount_path: String,
    /// Percent of capacity in use (0-100).
    pub percent_used: u8,
}

impl ProbeResult {
    pub fn new(mount_path: impl Into<String>, percent_used: u8) -> Self {
        Self {
            mount_path: mount_path.into(),
            percent_used,
        }
    }
}

/// Sending half of the probe result channel.
#[derive(Debug, Clone)]
pub struct ProbeSink {
    tx: mpsc::UnboundedSender<ProbeResult>,
}

/// Receiving half of the probe result channel.
pub type ProbeReceiver = mpsc::UnboundedReceiver<ProbeResult>;

/// Create a connected sink/receiver pair.
pub fn probe_channel() -> (ProbeSink, ProbeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProbeSink { tx }, rx)
}

impl ProbeSink {
    /// Queue a result for relaying.
    ///
    /// Returns `false` if nobody is listening anymore; the result is dropped.
    pub fn emit(&self, result: ProbeResult) -> bool {
        match self.tx.send(result) {
            Ok(()) => true,
            Err(e) => {
                debug!(mount = %e.0.mount_path, "Probe result dropped, relay is gone");
                false
            }
        }
    }
}

/// Error type for probe operations.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProbeError {
    pub message: String,
}

impl ProbeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Performs a disk usage scan.
///
/// `probe` may block for the duration of the scan, but must not wait for the
/// results it emitted to be consumed.
#[async_trait]
pub trait DiskProber: Send + Sync + 'static {
    async fn probe(&self, sink: &ProbeSink) -> Result<(), ProbeError>;
}

/// Prober that never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProber;

#[async_trait]
impl DiskProber for NoOpProber {
    async fn probe(&self, _sink: &ProbeSink) -> Result<(), ProbeError> {
        Ok(())
    }
}
