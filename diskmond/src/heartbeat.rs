//! Wakeup scheduling.
//!
//! The scheduler hands a [`ScheduleRequest`] window to a [`Heartbeat`] after
//! every wakeup and on every activity transition. The heartbeat must deliver
//! exactly one `WakeupFired` trigger inside that window. A newer request
//! supersedes any pending one.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::scheduler::{ScheduleRequest, SchedulerHandle, Trigger};

/// Something that can arm a future wakeup.
pub trait Heartbeat: Send + Sync + 'static {
    fn schedule_wakeup(&self, request: ScheduleRequest);
}

/// Heartbeat driven by tokio timers.
///
/// Fires at the start of the window; the slack is left for callers that
/// coalesce wakeups across subsystems.
pub struct TokioHeartbeat {
    scheduler: SchedulerHandle,
    pending: Mutex<Option<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl TokioHeartbeat {
    pub fn new(scheduler: SchedulerHandle, cancellation_token: CancellationToken) -> Self {
        Self {
            scheduler,
            pending: Mutex::new(None),
            cancellation_token,
        }
    }

    /// Whether a wakeup is currently armed.
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Heartbeat for TokioHeartbeat {
    fn schedule_wakeup(&self, request: ScheduleRequest) {
        let scheduler = self.scheduler.clone();
        let token = self.cancellation_token.clone();

        // Delivery waits out a full mailbox; a lost wakeup would end the
        // re-arm chain.
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = async {
                    tokio::time::sleep(request.min_delay).await;
                    debug!("Wakeup fired after {}s", request.min_secs());
                    if let Err(e) = scheduler.deliver(Trigger::WakeupFired).await {
                        warn!("Failed to deliver wakeup: {}", e);
                    }
                } => {}
            }
        });

        if let Some(previous) = self.pending.lock().replace(task) {
            previous.abort();
        }
    }
}

impl Drop for TokioHeartbeat {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}

/// Heartbeat that only records the requests it receives.
#[derive(Debug, Default, Clone)]
pub struct RecordingHeartbeat {
    requests: Arc<Mutex<Vec<ScheduleRequest>>>,
}

impl RecordingHeartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ScheduleRequest> {
        self.requests.lock().clone()
    }

    pub fn last(&self) -> Option<ScheduleRequest> {
        self.requests.lock().last().copied()
    }
}

impl Heartbeat for RecordingHeartbeat {
    fn schedule_wakeup(&self, request: ScheduleRequest) {
        self.requests.lock().push(request);
    }
}

impl<H: Heartbeat> Heartbeat for Arc<H> {
    fn schedule_wakeup(&self, request: ScheduleRequest) {
        (**self).schedule_wakeup(request);
    }
}
