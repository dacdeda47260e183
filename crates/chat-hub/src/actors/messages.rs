//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via `tokio::sync::mpsc`.
//! Request-reply uses `tokio::sync::oneshot`.

use crate::conference::{ConferenceError, ConferenceInfo, CreateOutcome, Departure, JoinOutcome};
use chrono::{DateTime, Utc};
use common::types::ConferenceId;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Messages sent to a `ConnectionActor`.
#[derive(Debug)]
pub enum ConnectionMessage {
    /// Write one serialized envelope to the client.
    ///
    /// The frame is shared by every recipient of the same fan-out.
    Deliver { frame: Arc<str> },

    /// Send a close signal and stop the actor.
    Close { code: u16, reason: String },
}

/// Messages sent to the `ConferenceManagerActor`.
#[derive(Debug)]
pub enum ConferenceMessage {
    Create {
        creator: String,
        room: Option<String>,
        now: DateTime<Utc>,
        respond_to: oneshot::Sender<CreateOutcome>,
    },

    Join {
        conference_id: ConferenceId,
        username: String,
        respond_to: oneshot::Sender<Result<JoinOutcome, ConferenceError>>,
    },

    /// Leave whatever conference the user occupies, looked up by username.
    Leave {
        username: String,
        respond_to: oneshot::Sender<Option<Departure>>,
    },

    GetInfo {
        conference_id: ConferenceId,
        respond_to: oneshot::Sender<Option<ConferenceInfo>>,
    },

    GetByRoom {
        room: String,
        respond_to: oneshot::Sender<Option<ConferenceInfo>>,
    },

    ConferenceOf {
        username: String,
        respond_to: oneshot::Sender<Option<ConferenceInfo>>,
    },
}
