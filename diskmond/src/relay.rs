//! Relays probe results onto the bus.
//!
//! Each [`ProbeResult`] becomes exactly one `disk_space_change_ind` signal,
//! in arrival order, with its values untouched. Failed emissions are logged
//! and dropped.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{BusGateway, DiskSpaceSignal};
use crate::probe::{ProbeReceiver, ProbeResult};

/// Translates probe results into outbound bus signals.
pub struct ResultRelay<G: BusGateway> {
    results: ProbeReceiver,
    gateway: G,
    cancellation_token: CancellationToken,
    relayed: u64,
}

impl<G: BusGateway> ResultRelay<G> {
    pub fn new(results: ProbeReceiver, gateway: G, cancellation_token: CancellationToken) -> Self {
        Self {
            results,
            gateway,
            cancellation_token,
            relayed: 0,
        }
    }

    /// Emit the signal for one result.
    pub fn relay(&mut self, result: ProbeResult) {
        let signal = DiskSpaceSignal::from(result);
        match self.gateway.emit(&signal) {
            Ok(()) => {
                self.relayed += 1;
                debug!(
                    mount = %signal.mount_path,
                    percent_used = signal.percent_used,
                    "Disk space change signalled"
                );
            }
            Err(e) => warn!(
                "Failed to signal disk space change for {}: {}",
                signal.mount_path, e
            ),
        }
    }

    /// Relay results until the channel closes or the token is cancelled.
    ///
    /// Returns the number of signals emitted.
    pub async fn run(mut self) -> u64 {
        loop {
            tokio::select! {
                biased;

                result = self.results.recv() => match result {
                    Some(result) => self.relay(result),
                    None => break,
                },
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        debug!("Result relay stopped after {} signals", self.relayed);
        self.relayed
    }
}
