//! Handle for sending messages to the scheduler actor.
//!
//! Sends are backpressure-aware: a non-blocking `try_send` first, then a
//! bounded wait for a mailbox slot.

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::messages::{CheckAck, SchedulerMessage, SchedulerSnapshot};
use super::state::Trigger;

/// Default mailbox capacity for the scheduler.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Default timeout for send operations when the mailbox is full.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The actor has stopped and is no longer accepting messages.
    ActorStopped,
    /// The mailbox is full.
    MailboxFull,
    /// The send operation timed out.
    Timeout,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::ActorStopped => write!(f, "Actor has stopped"),
            SendError::MailboxFull => write!(f, "Mailbox is full"),
            SendError::Timeout => write!(f, "Send operation timed out"),
        }
    }
}

impl std::error::Error for SendError {}

/// A cloneable handle to the scheduler actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
    cancellation_token: CancellationToken,
}

impl SchedulerHandle {
    pub fn new(sender: mpsc::Sender<SchedulerMessage>, cancellation_token: CancellationToken) -> Self {
        Self {
            sender,
            cancellation_token,
        }
    }

    /// Send a message, waiting at most [`DEFAULT_SEND_TIMEOUT`] for mailbox space.
    pub async fn send(&self, msg: SchedulerMessage) -> Result<(), SendError> {
        self.send_with_timeout(msg, DEFAULT_SEND_TIMEOUT).await
    }

    /// Send a message with a custom timeout.
    pub async fn send_with_timeout(
        &self,
        msg: SchedulerMessage,
        timeout: Duration,
    ) -> Result<(), SendError> {
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                match tokio::time::timeout(timeout, self.sender.reserve()).await {
                    Ok(Ok(permit)) => {
                        permit.send(msg);
                        Ok(())
                    }
                    Ok(Err(_)) => Err(SendError::ActorStopped),
                    Err(_) => Err(SendError::Timeout),
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ActorStopped),
        }
    }

    /// Try to send a message without blocking.
    pub fn try_send(&self, msg: SchedulerMessage) -> Result<(), SendError> {
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SendError::MailboxFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ActorStopped),
        }
    }

    /// Deliver a trigger that needs no reply.
    pub async fn trigger(&self, trigger: Trigger) -> Result<(), SendError> {
        self.send(SchedulerMessage::Trigger(trigger)).await
    }

    /// Deliver a trigger that must not be dropped.
    ///
    /// Waits for mailbox space without a deadline. Fails only once the actor
    /// has stopped or been cancelled.
    pub async fn deliver(&self, trigger: Trigger) -> Result<(), SendError> {
        tokio::select! {
            biased;

            _ = self.cancellation_token.cancelled() => Err(SendError::ActorStopped),
            result = self.sender.send(SchedulerMessage::Trigger(trigger)) => {
                result.map_err(|_| SendError::ActorStopped)
            }
        }
    }

    /// Ask for an immediate check and wait for the acknowledgement.
    pub async fn request_check(&self) -> Result<CheckAck, SendError> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerMessage::CheckRequest { reply }).await?;
        rx.await.map_err(|_| SendError::ActorStopped)
    }

    /// Query the current scheduler state.
    pub async fn snapshot(&self) -> Result<SchedulerSnapshot, SendError> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerMessage::GetState(reply)).await?;
        rx.await.map_err(|_| SendError::ActorStopped)
    }

    /// Ask the actor to stop after the messages already queued.
    pub async fn stop(&self) -> Result<(), SendError> {
        self.send(SchedulerMessage::Stop).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("capacity", &self.sender.capacity())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
