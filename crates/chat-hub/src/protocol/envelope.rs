//! Outbound envelopes.

use super::inbound::FileRef;
use super::MessageKind;
use chrono::{DateTime, Utc};
use common::types::ConferenceId;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One unit delivered to clients.
///
/// `sender` and `timestamp` always come from the hub. The kind-specific
/// fields are flattened next to them on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EnvelopeBody,
}

/// Kind-specific envelope fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvelopeBody {
    Content(ContentBody),
    Edit {
        message_id: String,
        text: String,
    },
    Delete {
        message_id: String,
    },
    Typing {
        is_typing: bool,
    },
    Presence {
        username: String,
    },
    Notification {
        payload: Value,
    },
    Relay {
        target: String,
        payload: Value,
    },
    ConferenceRelay {
        conference_id: ConferenceId,
        target: String,
        payload: Value,
    },
    ConferenceMember {
        conference_id: ConferenceId,
        username: String,
    },
    ConferencePeers {
        conference_id: ConferenceId,
        peers: Vec<String>,
    },
}

/// Fields of a persisted content message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentBody {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new(
        kind: MessageKind,
        sender: impl Into<String>,
        room: Option<String>,
        timestamp: DateTime<Utc>,
        body: EnvelopeBody,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            room,
            timestamp,
            body,
        }
    }

    /// Synthetic presence envelope for a user entering or leaving the public room.
    pub fn presence(kind: MessageKind, username: &str, public_room: &str) -> Self {
        Self::new(
            kind,
            username,
            Some(public_room.to_string()),
            Utc::now(),
            EnvelopeBody::Presence {
                username: username.to_string(),
            },
        )
    }

    /// Conference notification; conference traffic carries no room.
    pub fn conference(kind: MessageKind, sender: &str, body: EnvelopeBody) -> Self {
        Self::new(kind, sender, None, Utc::now(), body)
    }

    /// Serialize once so a fan-out can share the bytes across recipients.
    pub fn to_frame(&self) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }
}
