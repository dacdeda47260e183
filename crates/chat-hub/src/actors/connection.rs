//! `ConnectionActor` - owns the write half of one client connection.
//!
//! Each `ConnectionActor`:
//! - Is 1:1 with a registered session
//! - Drains a bounded FIFO mailbox, so a recipient sees envelopes in the
//!   order the hub dispatched them
//! - Never blocks a sender: a full mailbox refuses the envelope
//!
//! # Lifecycle
//!
//! 1. Spawned by the hub right after identity validation
//! 2. Runs until closed, cancelled, or a transport write fails
//! 3. Cancellation via child token propagates from the hub's root token
//!
//! The task's [`ConnectionExit`] tells the hub whether the connection died of
//! a transport error, which triggers the same cleanup as a disconnect.

use super::messages::ConnectionMessage;
use super::metrics::{ActorType, MailboxMonitor};
use crate::transport::{FrameSink, CLOSE_NORMAL};

use common::types::ConnectionId;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Outcome of handing one envelope to a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Offline, closing, or mailbox full. Not an error.
    Skipped,
}

/// Why a `ConnectionActor` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionExit {
    /// A close was requested through the handle.
    Closed,
    /// The token was cancelled (disconnect or shutdown).
    Cancelled,
    /// A write failed; the connection is unreachable.
    TransportFailed(String),
    /// Every handle was dropped.
    MailboxClosed,
}

/// Handle to a `ConnectionActor`.
#[derive(Clone, Debug)]
pub struct ConnectionActorHandle {
    sender: mpsc::Sender<ConnectionMessage>,
    cancel_token: CancellationToken,
    connection_id: ConnectionId,
    username: Arc<str>,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionActorHandle {
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Queue a frame for the client without waiting.
    pub fn deliver(&self, frame: Arc<str>) -> Delivery {
        if self.cancel_token.is_cancelled() {
            return Delivery::Skipped;
        }

        match self.sender.try_send(ConnectionMessage::Deliver { frame }) {
            Ok(()) => {
                self.mailbox.record_enqueue();
                Delivery::Delivered
            }
            Err(TrySendError::Full(_)) => {
                self.mailbox.record_drop();
                Delivery::Skipped
            }
            Err(TrySendError::Closed(_)) => Delivery::Skipped,
        }
    }

    /// Ask the actor to send a close signal after the frames already queued.
    ///
    /// If the mailbox cannot take the request the actor is cancelled instead.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        let message = ConnectionMessage::Close {
            code,
            reason: reason.into(),
        };
        if self.sender.try_send(message).is_ok() {
            self.mailbox.record_enqueue();
        } else {
            self.cancel_token.cancel();
        }
    }

    /// Cancel the connection actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Resolves once the actor has stopped or been told to stop.
    pub async fn closed(&self) {
        self.cancel_token.cancelled().await;
    }

    #[must_use]
    pub fn mailbox(&self) -> &MailboxMonitor {
        &self.mailbox
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor {
    connection_id: ConnectionId,
    username: Arc<str>,
    sink: Box<dyn FrameSink>,
    receiver: mpsc::Receiver<ConnectionMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionActor {
    /// Spawn a new connection actor with a mailbox of `buffer` frames.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        connection_id: ConnectionId,
        username: &str,
        sink: Box<dyn FrameSink>,
        buffer: usize,
        cancel_token: CancellationToken,
    ) -> (ConnectionActorHandle, JoinHandle<ConnectionExit>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let username: Arc<str> = Arc::from(username);
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Connection,
            connection_id.to_string(),
        ));

        let actor = Self {
            connection_id,
            username: Arc::clone(&username),
            sink,
            receiver,
            cancel_token: cancel_token.clone(),
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConnectionActorHandle {
            sender,
            cancel_token,
            connection_id,
            username,
            mailbox,
        };

        (handle, task_handle)
    }

    #[instrument(
        skip_all,
        name = "hub.actor.connection",
        fields(connection_id = %self.connection_id, username = %self.username)
    )]
    async fn run(mut self) -> ConnectionExit {
        debug!(target: "hub.connection", "ConnectionActor started");

        let exit = loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    // Best effort; the peer may already be gone.
                    let _ = self.sink.close(CLOSE_NORMAL, "closing").await;
                    break ConnectionExit::Cancelled;
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        break ConnectionExit::MailboxClosed;
                    };
                    self.mailbox.record_dequeue();
                    if let Some(exit) = self.handle_message(message).await {
                        break exit;
                    }
                }
            }
        };

        self.cancel_token.cancel();

        info!(
            target: "hub.connection",
            connection_id = %self.connection_id,
            username = %self.username,
            frames_written = self.mailbox.messages_processed(),
            frames_refused = self.mailbox.messages_dropped(),
            exit = ?exit,
            "ConnectionActor stopped"
        );

        exit
    }

    /// Handle a single message. Returns the exit reason if the actor should stop.
    async fn handle_message(&mut self, message: ConnectionMessage) -> Option<ConnectionExit> {
        match message {
            ConnectionMessage::Deliver { frame } => {
                match self.sink.send_text(&frame).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(
                            target: "hub.connection",
                            connection_id = %self.connection_id,
                            error = %e,
                            "Transport write failed"
                        );
                        Some(ConnectionExit::TransportFailed(e.to_string()))
                    }
                }
            }

            ConnectionMessage::Close { code, reason } => {
                debug!(
                    target: "hub.connection",
                    connection_id = %self.connection_id,
                    code = code,
                    reason = %reason,
                    "Closing connection"
                );
                let _ = self.sink.close(code, &reason).await;
                Some(ConnectionExit::Closed)
            }
        }
    }
}
