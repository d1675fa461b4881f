//! Scheduler mailbox message types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use super::state::{SchedulerState, SchedulerStats, Trigger};

/// Messages that can be sent to the scheduler actor.
#[derive(Debug)]
pub enum SchedulerMessage {
    /// A trigger that needs no reply (wakeup, boot, activity).
    Trigger(Trigger),
    /// Explicit check request; acknowledged once the attempt was made.
    CheckRequest { reply: oneshot::Sender<CheckAck> },
    /// Query current state (response sent via oneshot channel).
    GetState(oneshot::Sender<SchedulerSnapshot>),
    /// Request graceful shutdown.
    Stop,
}

/// Acknowledgement for an explicit check request.
///
/// The reply only says whether a probe was started; the probe results arrive
/// later through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckAck {
    pub probed: bool,
}

/// Point-in-time view of the scheduler state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    pub boot_completed: bool,
    pub device_active: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub stats: SchedulerStats,
}

impl From<&SchedulerState> for SchedulerSnapshot {
    fn from(state: &SchedulerState) -> Self {
        Self {
            boot_completed: state.boot_completed(),
            device_active: state.device_active(),
            last_check: state.last_check(),
            stats: state.stats().clone(),
        }
    }
}
