//! Service wiring.
//!
//! Spawns the scheduler actor, the result relay and the wakeup heartbeat, and
//! hands out the handles needed to feed them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::{BusBinding, BusEndpoint, BusGateway};
use crate::clock::Clock;
use crate::config::DiskMonitorConfig;
use crate::heartbeat::TokioHeartbeat;
use crate::probe::{DiskProber, probe_channel};
use crate::relay::ResultRelay;
use crate::scheduler::{self, ActorOutcome, DiskMonitorActor, SchedulerHandle};
use crate::{Error, Result};

/// A running disk monitor.
pub struct DiskMonitorService {
    handle: SchedulerHandle,
    endpoint: BusEndpoint,
    heartbeat: Arc<TokioHeartbeat>,
    cancellation_token: CancellationToken,
    scheduler_task: JoinHandle<ActorOutcome>,
    relay_task: JoinHandle<u64>,
}

impl DiskMonitorService {
    /// Validate the config and start all tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<P, G, C>(
        config: &DiskMonitorConfig,
        prober: Arc<P>,
        gateway: G,
        clock: C,
    ) -> Result<Self>
    where
        P: DiskProber,
        G: BusGateway,
        C: Clock,
    {
        config.validate()?;

        let cancellation_token = CancellationToken::new();
        let (handle, mailbox) = scheduler::mailbox(cancellation_token.child_token());
        let heartbeat = Arc::new(TokioHeartbeat::new(
            handle.clone(),
            cancellation_token.child_token(),
        ));
        let (sink, results) = probe_channel();

        let actor = DiskMonitorActor::new(
            mailbox,
            config.policy(),
            prober,
            sink,
            heartbeat.clone(),
            clock,
            cancellation_token.child_token(),
        );
        let relay = ResultRelay::new(results, gateway, cancellation_token.child_token());
        let endpoint = BusEndpoint::new(handle.clone(), Arc::new(BusBinding::new()));

        let scheduler_task = tokio::spawn(actor.run());
        let relay_task = tokio::spawn(relay.run());

        info!(
            "Disk monitor started (active {}s, idle {}s, stale after {}s)",
            config.active_interval_secs, config.idle_interval_secs, config.stale_threshold_secs
        );

        Ok(Self {
            handle,
            endpoint,
            heartbeat,
            cancellation_token,
            scheduler_task,
            relay_task,
        })
    }

    /// Handle for sending triggers directly to the scheduler.
    pub fn handle(&self) -> &SchedulerHandle {
        &self.handle
    }

    /// Endpoint for inbound bus traffic.
    pub fn endpoint(&self) -> BusEndpoint {
        self.endpoint.clone()
    }

    /// Token cancelled when the service shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Whether a wakeup is currently armed.
    pub fn wakeup_pending(&self) -> bool {
        self.heartbeat.has_pending()
    }

    /// Stop the scheduler, let the relay drain, then cancel everything else.
    ///
    /// Results emitted by a probe that already ran are still relayed.
    pub async fn shutdown(self) -> Result<()> {
        if let Err(e) = self.handle.stop().await {
            debug!("Scheduler already gone: {}", e);
        }

        let outcome = self
            .scheduler_task
            .await
            .map_err(|e| Error::Other(format!("Scheduler task failed: {}", e)))?;
        debug!("Scheduler finished: {:?}", outcome);

        // The actor owned the only probe sink, so the relay ends once drained.
        let relayed = self
            .relay_task
            .await
            .map_err(|e| Error::Other(format!("Relay task failed: {}", e)))?;

        self.cancellation_token.cancel();
        drop(self.heartbeat);

        info!("Disk monitor stopped, {} signals relayed", relayed);
        Ok(())
    }
}
