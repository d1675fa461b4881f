//! Activity-aware disk check scheduling.
//!
//! The scheduler is responsible for:
//! - Gating every probe on boot completion
//! - Tracking device activity and de-duplicating repeated activity signals
//! - Forcing a probe when the device becomes active after a stale check
//! - Re-arming the wakeup after each wakeup and each activity transition
//!
//! [`SchedulerState`] is the pure state machine; [`DiskMonitorActor`] owns it
//! and performs the side effects one message at a time.

mod actor;
mod handle;
mod messages;
mod state;

pub use actor::{ActorOutcome, DiskMonitorActor, mailbox};
pub use handle::{DEFAULT_MAILBOX_CAPACITY, DEFAULT_SEND_TIMEOUT, SchedulerHandle, SendError};
pub use messages::{CheckAck, SchedulerMessage, SchedulerSnapshot};
pub use state::{
    ACTIVE_CHECK_INTERVAL, CheckPolicy, Decision, IDLE_CHECK_INTERVAL, ProbeDecision,
    STALE_THRESHOLD, ScheduleRequest, SchedulerState, SchedulerStats, Trigger, WAKEUP_SLACK,
};
