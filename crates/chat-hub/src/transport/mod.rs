//! Transport seam between the hub and a live client connection.
//!
//! The hub never touches a socket directly. Each connection's write half is
//! wrapped in a [`FrameSink`] and owned by that connection's
//! `ConnectionActor`; the read half is driven by the transport layer, which
//! calls into [`crate::hub::Hub`] for every lifecycle event.
//!
//! - [`ws`]: axum WebSocket endpoint and sink
//! - [`channel`]: in-memory sink for driving the hub without a network

pub mod channel;
pub mod ws;

use async_trait::async_trait;
use thiserror::Error;

pub use channel::{ChannelSink, SinkEvent, SinkReceiver};

/// Close code for a rejected identity token.
pub const CLOSE_NOT_ACCEPTABLE: u16 = 4406;

/// Close code sent to a connection evicted by a newer one for the same user.
pub const CLOSE_SESSION_REPLACED: u16 = 4409;

/// Close code for server shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Transport write failures. Any of them makes the recipient unreachable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport write failed: {0}")]
    Write(String),
}

/// Write half of a client connection.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one serialized envelope.
    async fn send_text(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Send a close signal with `code` and `reason`.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}
