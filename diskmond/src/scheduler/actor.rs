//! The scheduler actor.
//!
//! Owns the [`SchedulerState`] and processes its mailbox one message at a
//! time, so no two triggers are ever handled concurrently and the state needs
//! no locking. A probe is awaited inside the handler that started it; the
//! results it emits are relayed by a separate task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{DEFAULT_MAILBOX_CAPACITY, SchedulerHandle};
use super::messages::{CheckAck, SchedulerMessage, SchedulerSnapshot};
use super::state::{CheckPolicy, Decision, ProbeDecision, SchedulerState, Trigger};
use crate::clock::Clock;
use crate::heartbeat::Heartbeat;
use crate::probe::{DiskProber, ProbeSink};

/// Outcome of the actor's run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorOutcome {
    /// A `Stop` message was processed or every handle was dropped.
    Stopped,
    /// The cancellation token fired.
    Cancelled,
}

/// Create the scheduler mailbox.
pub fn mailbox(
    cancellation_token: CancellationToken,
) -> (SchedulerHandle, mpsc::Receiver<SchedulerMessage>) {
    let (tx, rx) = mpsc::channel(DEFAULT_MAILBOX_CAPACITY);
    (SchedulerHandle::new(tx, cancellation_token), rx)
}

/// Actor deciding when disk space is checked and when to wake up next.
pub struct DiskMonitorActor<P: DiskProber, H: Heartbeat, C: Clock> {
    mailbox: mpsc::Receiver<SchedulerMessage>,
    state: SchedulerState,
    policy: CheckPolicy,
    prober: Arc<P>,
    sink: ProbeSink,
    heartbeat: H,
    clock: C,
    cancellation_token: CancellationToken,
}

impl<P: DiskProber, H: Heartbeat, C: Clock> DiskMonitorActor<P, H, C> {
    /// Create an actor reading from a mailbox made with [`mailbox`].
    pub fn new(
        mailbox: mpsc::Receiver<SchedulerMessage>,
        policy: CheckPolicy,
        prober: Arc<P>,
        sink: ProbeSink,
        heartbeat: H,
        clock: C,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            mailbox,
            state: SchedulerState::new(),
            policy,
            prober,
            sink,
            heartbeat,
            clock,
            cancellation_token,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Run the event loop until stopped or cancelled.
    ///
    /// The first wakeup is armed before any message is processed.
    pub async fn run(mut self) -> ActorOutcome {
        info!("Disk monitor scheduler starting");

        let initial = self.state.current_schedule(&self.policy);
        debug!(
            "Scheduling first wakeup in {}..{}s",
            initial.min_secs(),
            initial.max_secs()
        );
        self.heartbeat.schedule_wakeup(initial);

        loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    info!("Disk monitor scheduler cancelled");
                    return ActorOutcome::Cancelled;
                }

                msg = self.mailbox.recv() => {
                    let Some(msg) = msg else {
                        debug!("Scheduler mailbox closed");
                        break;
                    };
                    if self.handle_message(msg).await {
                        break;
                    }
                }
            }
        }

        info!("Disk monitor scheduler stopped");
        ActorOutcome::Stopped
    }

    /// Handle one message. Returns `true` if the actor should stop.
    async fn handle_message(&mut self, msg: SchedulerMessage) -> bool {
        match msg {
            SchedulerMessage::Trigger(trigger) => {
                self.dispatch(trigger).await;
                false
            }
            SchedulerMessage::CheckRequest { reply } => {
                self.handle_check_request(reply).await;
                false
            }
            SchedulerMessage::GetState(reply) => {
                let _ = reply.send(SchedulerSnapshot::from(&self.state));
                false
            }
            SchedulerMessage::Stop => true,
        }
    }

    async fn handle_check_request(&mut self, reply: oneshot::Sender<CheckAck>) {
        info!("Disk space check requested");

        let decision = self.dispatch(Trigger::CheckRequested).await;

        if reply
            .send(CheckAck {
                probed: decision.should_probe(),
            })
            .is_err()
        {
            debug!("Check requester went away before the acknowledgement");
        }
    }

    /// Apply a trigger, probe if allowed, then re-arm the wakeup if needed.
    pub async fn dispatch(&mut self, trigger: Trigger) -> Decision {
        let was_active = self.state.device_active();
        let now = self.clock.now();
        let decision = self.state.apply(trigger, now, &self.policy);

        match trigger {
            Trigger::BootCompleted => debug!("Boot completion received"),
            Trigger::ActivityChanged { active } if active != was_active => {
                debug!(
                    "Device became {}",
                    if active { "active" } else { "inactive" }
                );
            }
            _ => {}
        }

        match decision.probe {
            ProbeDecision::Run => {
                debug!("Checking disk space ({})", trigger.name());
                if let Err(e) = self.prober.probe(&self.sink).await {
                    warn!("Disk space check failed: {}", e);
                }
            }
            ProbeDecision::Suppressed => {
                debug!("Boot not completed, skipping disk space check");
            }
            ProbeDecision::Skipped => {}
        }

        if let Some(request) = decision.reschedule {
            debug!(
                "Next wakeup in {}..{}s",
                request.min_secs(),
                request.max_secs()
            );
            self.heartbeat.schedule_wakeup(request);
        }

        decision
    }
}
