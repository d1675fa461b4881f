//! In-process bus gateway backed by a broadcast channel.

use tokio::sync::broadcast;

use super::{BusError, BusGateway, DiskSpaceSignal};

/// Broadcast channel capacity for emitted signals.
const SIGNAL_BROADCAST_CAPACITY: usize = 256;

/// Gateway that fans emitted signals out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<DiskSpaceSignal>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribe to every signal emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DiskSpaceSignal> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusGateway for BroadcastBus {
    fn emit(&self, signal: &DiskSpaceSignal) -> Result<(), BusError> {
        // A signal nobody listens to is not an error.
        let _ = self.tx.send(signal.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(path: &str, percent: u8) -> DiskSpaceSignal {
        DiskSpaceSignal {
            mount_path: path.to_string(),
            percent_used: percent,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = BroadcastBus::new();
        let mut rx = bus.subscribe();

        bus.emit(&signal("/", 91)).unwrap();
        bus.emit(&signal("/tmp", 75)).unwrap();

        assert_eq!(rx.recv().await.unwrap(), signal("/", 91));
        assert_eq!(rx.recv().await.unwrap(), signal("/tmp", 75));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = BroadcastBus::new();
        assert!(bus.emit(&signal("/", 50)).is_ok());
    }
}
