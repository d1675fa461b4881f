//! System bus integration.
//!
//! Inbound: the `req_check` method, the boot-done signal and the inactivity
//! signal. Outbound: one `disk_space_change_ind` signal per probe result.
//! The wire transport itself lives behind [`BusGateway`].

mod binding;
mod broadcast;
mod line;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probe::ProbeResult;
use crate::scheduler::{SendError, Trigger};

pub use binding::{BusBinding, BusEndpoint};
pub use broadcast::BroadcastBus;
pub use line::{InboundMessage, LineBus, serve_lines};

/// Well-known service name.
pub const SERVICE: &str = "com.nokia.diskmonitor";
/// Interface of the check request method.
pub const REQUEST_INTERFACE: &str = "com.nokia.diskmonitor.request";
/// Object path of the check request method.
pub const REQUEST_PATH: &str = "/com/nokia/diskmonitor/request";
/// Method asking for an immediate check.
pub const REQ_CHECK: &str = "req_check";
/// Interface of the emitted signal.
pub const SIGNAL_INTERFACE: &str = "com.nokia.diskmonitor.signal";
/// Object path of the emitted signal.
pub const SIGNAL_PATH: &str = "/com/nokia/diskmonitor/signal";
/// Signal carrying `(mount_path, percent_used)`.
pub const DISK_SPACE_CHANGE_IND: &str = "disk_space_change_ind";

/// Interface of the boot-done signal.
pub const STARTUP_SIGNAL_INTERFACE: &str = "com.nokia.startup.signal";
pub const BASE_BOOT_DONE: &str = "base_boot_done";
/// Interface of the activity signal.
pub const MCE_SIGNAL_INTERFACE: &str = "com.nokia.mce.signal";
pub const SYSTEM_INACTIVITY_IND: &str = "system_inactivity_ind";

/// Error type for bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("Handlers are not bound to the bus")]
    NotBound,

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Failed to emit signal: {0}")]
    Emit(String),

    #[error("Scheduler unavailable: {0}")]
    Scheduler(#[from] SendError),
}

/// A signal this daemon listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundSignal {
    /// `com.nokia.startup.signal.base_boot_done`
    BaseBootDone,
    /// `com.nokia.mce.signal.system_inactivity_ind`; zero means active.
    SystemInactivity(i32),
}

impl InboundSignal {
    /// Resolve a signal from its interface and member name.
    pub fn from_name(interface: &str, member: &str, arg: Option<i32>) -> Option<Self> {
        match (interface, member) {
            (STARTUP_SIGNAL_INTERFACE, BASE_BOOT_DONE) => Some(Self::BaseBootDone),
            (MCE_SIGNAL_INTERFACE, SYSTEM_INACTIVITY_IND) => arg.map(Self::SystemInactivity),
            _ => None,
        }
    }

    /// The scheduler trigger this signal maps to.
    pub fn to_trigger(self) -> Trigger {
        match self {
            Self::BaseBootDone => Trigger::BootCompleted,
            Self::SystemInactivity(inactive) => Trigger::ActivityChanged {
                active: inactive == 0,
            },
        }
    }
}

/// Outbound disk space notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpaceSignal {
    pub mount_path: String,
    pub percent_used: u8,
}

impl From<ProbeResult> for DiskSpaceSignal {
    fn from(result: ProbeResult) -> Self {
        Self {
            mount_path: result.mount_path,
            percent_used: result.percent_used,
        }
    }
}

/// Outbound side of the bus.
pub trait BusGateway: Send + Sync + 'static {
    /// Emit one `disk_space_change_ind` signal.
    fn emit(&self, signal: &DiskSpaceSignal) -> Result<(), BusError>;
}

impl<G: BusGateway> BusGateway for std::sync::Arc<G> {
    fn emit(&self, signal: &DiskSpaceSignal) -> Result<(), BusError> {
        (**self).emit(signal)
    }
}
