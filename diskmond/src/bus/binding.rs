//! Handler binding and inbound routing.
//!
//! Handlers are bound when the bus connects and unbound when it disconnects.
//! While unbound, inbound traffic is dropped as if no handler existed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::{BusError, InboundSignal, REQ_CHECK};
use crate::scheduler::{CheckAck, SchedulerHandle};

/// Tracks whether method and signal handlers are bound.
#[derive(Debug, Default)]
pub struct BusBinding {
    methods_bound: AtomicBool,
    signals_bound: AtomicBool,
}

impl BusBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind all handlers. Binding twice is harmless.
    pub fn bind(&self) {
        debug!("Bus connected, binding handlers");
        if !self.methods_bound.swap(true, Ordering::SeqCst) {
            debug!("Bound check request method");
        }
        if !self.signals_bound.swap(true, Ordering::SeqCst) {
            debug!("Bound boot and activity signals");
        }
    }

    /// Unbind all handlers. Unbinding twice is harmless.
    pub fn unbind(&self) {
        debug!("Bus disconnected, unbinding handlers");
        self.methods_bound.store(false, Ordering::SeqCst);
        self.signals_bound.store(false, Ordering::SeqCst);
    }

    pub fn methods_bound(&self) -> bool {
        self.methods_bound.load(Ordering::SeqCst)
    }

    pub fn signals_bound(&self) -> bool {
        self.signals_bound.load(Ordering::SeqCst)
    }
}

/// Routes bound inbound bus traffic to the scheduler.
#[derive(Debug, Clone)]
pub struct BusEndpoint {
    scheduler: SchedulerHandle,
    binding: Arc<BusBinding>,
}

impl BusEndpoint {
    pub fn new(scheduler: SchedulerHandle, binding: Arc<BusBinding>) -> Self {
        Self { scheduler, binding }
    }

    pub fn binding(&self) -> &BusBinding {
        &self.binding
    }

    /// The bus became available.
    pub fn connect(&self) {
        self.binding.bind();
    }

    /// The bus went away.
    pub fn disconnect(&self) {
        self.binding.unbind();
    }

    /// Deliver an inbound signal.
    pub async fn deliver_signal(&self, signal: InboundSignal) -> Result<(), BusError> {
        if !self.binding.signals_bound() {
            debug!("Dropping {:?}, signals not bound", signal);
            return Err(BusError::NotBound);
        }

        debug!("Received {:?}", signal);
        // Boot completion is signalled once; waiting beats dropping it.
        self.scheduler.deliver(signal.to_trigger()).await?;
        Ok(())
    }

    /// Handle an inbound method call and produce its reply.
    ///
    /// The reply is sent once the check was attempted, whether or not it
    /// actually probed.
    pub async fn call_method(
        &self,
        method: &str,
        sender: Option<&str>,
    ) -> Result<CheckAck, BusError> {
        if !self.binding.methods_bound() {
            return Err(BusError::NotBound);
        }
        if method != REQ_CHECK {
            return Err(BusError::UnknownMethod(method.to_string()));
        }

        info!(
            "Check request received over the bus from {}",
            sender.unwrap_or("(unknown)")
        );
        Ok(self.scheduler.request_check().await?)
    }
}
