//! In-memory [`FrameSink`] backed by an unbounded channel.
//!
//! Lets the full connection lifecycle run without a socket: frames written
//! by the hub show up on the paired [`SinkReceiver`]. Dropping the receiver
//! makes later writes fail, which is how a broken transport looks to the hub.

use super::{FrameSink, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Something the hub did to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Frame(String),
    Closed { code: u16, reason: String },
}

#[derive(Debug)]
pub struct ChannelSink {
    events: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver observing it.
    #[must_use]
    pub fn pair() -> (Self, SinkReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, SinkReceiver { receiver })
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_text(&mut self, frame: &str) -> Result<(), TransportError> {
        self.events
            .send(SinkEvent::Frame(frame.to_string()))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.events
            .send(SinkEvent::Closed {
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| TransportError::Closed)
    }
}

/// Observer side of a [`ChannelSink`].
#[derive(Debug)]
pub struct SinkReceiver {
    receiver: mpsc::UnboundedReceiver<SinkEvent>,
}

impl SinkReceiver {
    /// Wait up to `timeout` for the next event.
    pub async fn next_event(&mut self, timeout: Duration) -> Option<SinkEvent> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait up to `timeout` for the next frame, parsed as JSON.
    ///
    /// Close events and unparsable frames yield `None`.
    pub async fn next_json(&mut self, timeout: Duration) -> Option<serde_json::Value> {
        match self.next_event(timeout).await? {
            SinkEvent::Frame(text) => serde_json::from_str(&text).ok(),
            SinkEvent::Closed { .. } => None,
        }
    }

    /// Drain every event already queued, without waiting.
    pub fn drain(&mut self) -> Vec<SinkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}
