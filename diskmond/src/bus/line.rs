//! Newline-delimited text transport.
//!
//! Inbound lines:
//! - `connect` / `disconnect`
//! - `boot_done` (or `com.nokia.startup.signal.base_boot_done`)
//! - `inactivity <int>` (or `com.nokia.mce.signal.system_inactivity_ind <int>`)
//! - `req_check` (or `com.nokia.diskmonitor.request.req_check`)
//!
//! Outbound signals and method replies are written as JSON lines.

use std::io::Write;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    BASE_BOOT_DONE, BusEndpoint, BusError, BusGateway, DISK_SPACE_CHANGE_IND, DiskSpaceSignal,
    InboundSignal, MCE_SIGNAL_INTERFACE, REQ_CHECK, REQUEST_INTERFACE, SIGNAL_INTERFACE,
    SIGNAL_PATH, STARTUP_SIGNAL_INTERFACE, SYSTEM_INACTIVITY_IND,
};

/// One parsed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Connect,
    Disconnect,
    Signal(InboundSignal),
    MethodCall { method: String },
}

impl FromStr for InboundMessage {
    type Err = BusError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(BusError::Malformed("empty line".to_string()));
        };
        let arg = parts
            .next()
            .map(|raw| {
                raw.parse::<i32>()
                    .map_err(|e| BusError::Malformed(format!("{}: {}", name, e)))
            })
            .transpose()?;

        let (interface, member) = match name.rsplit_once('.') {
            Some(qualified) => qualified,
            None => match name {
                "connect" => return Ok(Self::Connect),
                "disconnect" => return Ok(Self::Disconnect),
                REQ_CHECK => (REQUEST_INTERFACE, REQ_CHECK),
                "boot_done" | BASE_BOOT_DONE => (STARTUP_SIGNAL_INTERFACE, BASE_BOOT_DONE),
                "inactivity" | SYSTEM_INACTIVITY_IND => {
                    (MCE_SIGNAL_INTERFACE, SYSTEM_INACTIVITY_IND)
                }
                _ => return Err(BusError::Malformed(format!("unknown message: {}", name))),
            },
        };

        if (interface, member) == (REQUEST_INTERFACE, REQ_CHECK) {
            return Ok(Self::MethodCall {
                method: REQ_CHECK.to_string(),
            });
        }
        if member == SYSTEM_INACTIVITY_IND && arg.is_none() {
            return Err(BusError::Malformed(format!("{} needs an integer", name)));
        }

        InboundSignal::from_name(interface, member, arg)
            .map(Self::Signal)
            .ok_or_else(|| BusError::Malformed(format!("unknown message: {}", name)))
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundLine<'a> {
    Signal {
        path: &'a str,
        interface: &'a str,
        member: &'a str,
        mount_path: &'a str,
        percent_used: u8,
    },
    Reply {
        method: &'a str,
        probed: bool,
    },
    Error {
        message: String,
    },
}

/// Gateway writing JSON lines to any writer.
pub struct LineBus<W: Write + Send + 'static> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> LineBus<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the bus and return the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_line(&self, line: &OutboundLine<'_>) -> Result<(), BusError> {
        let json = serde_json::to_string(line).map_err(|e| BusError::Emit(e.to_string()))?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)
            .and_then(|_| writer.flush())
            .map_err(|e| BusError::Emit(e.to_string()))
    }
}

impl<W: Write + Send + 'static> BusGateway for LineBus<W> {
    fn emit(&self, signal: &DiskSpaceSignal) -> Result<(), BusError> {
        self.write_line(&OutboundLine::Signal {
            path: SIGNAL_PATH,
            interface: SIGNAL_INTERFACE,
            member: DISK_SPACE_CHANGE_IND,
            mount_path: &signal.mount_path,
            percent_used: signal.percent_used,
        })
    }
}

/// Read inbound lines until EOF or cancellation and route them to `endpoint`.
pub async fn serve_lines<R, W>(
    reader: R,
    endpoint: BusEndpoint,
    bus: &LineBus<W>,
    cancellation_token: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("Inbound stream closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = match line.parse::<InboundMessage>() {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring inbound line: {}", e);
                continue;
            }
        };

        match message {
            InboundMessage::Connect => endpoint.connect(),
            InboundMessage::Disconnect => endpoint.disconnect(),
            InboundMessage::Signal(signal) => {
                if let Err(e) = endpoint.deliver_signal(signal).await {
                    debug!("Signal not delivered: {}", e);
                }
            }
            InboundMessage::MethodCall { method } => {
                let reply = match endpoint.call_method(&method, Some("stdin")).await {
                    Ok(ack) => OutboundLine::Reply {
                        method: &method,
                        probed: ack.probed,
                    },
                    Err(e) => OutboundLine::Error {
                        message: e.to_string(),
                    },
                };
                if let Err(e) = bus.write_line(&reply) {
                    warn!("Failed to write reply: {}", e);
                }
            }
        }
    }

    Ok(())
}
