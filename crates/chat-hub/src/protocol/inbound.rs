//! Inbound client frames: parsing, shape validation and truncation.
//!
//! A frame is one JSON text message tagged by `type`. Fields the hub fills in
//! itself (`sender`, `timestamp`, `id`) are not part of any inbound struct, so
//! whatever a client puts there is discarded during parsing.

use super::MessageKind;
use crate::errors::DropReason;
use chrono::{DateTime, Utc};
use common::types::ConferenceId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest room id accepted in a frame.
pub const MAX_ROOM_ID_LEN: usize = 128;

/// Longest username accepted as a relay target.
pub const MAX_TARGET_LEN: usize = 64;

/// A parsed client frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message(ContentFields),
    Voice(ContentFields),
    VideoNote(ContentFields),
    Scheduled(ContentFields),
    Edit(EditFields),
    Delete(DeleteFields),
    Typing(TypingFields),
    TaskNotification(NotificationFields),
    PollNotification(NotificationFields),
    CallOffer(RelayFields),
    CallAnswer(RelayFields),
    CallReject(RelayFields),
    CallEnd(RelayFields),
    CallBusy(RelayFields),
    IceCandidate(RelayFields),
    ConferenceJoin(ConferenceJoinFields),
    ConferenceLeave(ConferenceLeaveFields),
    ConferenceOffer(RelayFields),
    ConferenceAnswer(RelayFields),
    ConferenceIce(RelayFields),
    KeyDistribution(RelayFields),
}

/// Reference to an uploaded file. The hub only passes it through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Body of chat text, voice, video-note and scheduled frames.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentFields {
    pub room: String,
    pub text: Option<String>,
    pub file: Option<FileRef>,
    /// End-to-end encrypted fields, opaque to the hub.
    pub encrypted: Option<Value>,
    pub extra: Option<Map<String, Value>>,
    /// Required for `scheduled`, ignored otherwise.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Self-destruct timer; the expiry sweep deletes the message afterwards.
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditFields {
    pub room: String,
    pub message_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteFields {
    pub room: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypingFields {
    pub room: String,
    #[serde(default = "default_true")]
    pub is_typing: bool,
}

/// Task and poll change notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationFields {
    pub room: String,
    #[serde(default)]
    pub payload: Value,
}

/// Anything relayed to exactly one named user with an opaque payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayFields {
    pub target: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConferenceJoinFields {
    pub conference_id: ConferenceId,
}

/// Leave carries no fields; the conference is found through the user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConferenceLeaveFields {}

fn default_true() -> bool {
    true
}

/// Parse a raw text frame, enforcing the byte limit before touching JSON.
pub fn parse_frame(raw: &str, max_frame_bytes: usize) -> Result<ClientFrame, DropReason> {
    if raw.len() > max_frame_bytes {
        return Err(DropReason::Oversized);
    }
    serde_json::from_str(raw).map_err(|e| {
        tracing::debug!(target: "hub.protocol", error = %e, "Malformed frame");
        DropReason::Malformed
    })
}

/// Hard-truncate `text` to at most `max_chars` characters.
///
/// Counts Unicode scalar values, so multi-byte characters are never split.
#[must_use]
pub fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_index);
    }
    text
}

impl ClientFrame {
    /// The kind tag of this frame.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            ClientFrame::Message(_) => MessageKind::Message,
            ClientFrame::Voice(_) => MessageKind::Voice,
            ClientFrame::VideoNote(_) => MessageKind::VideoNote,
            ClientFrame::Scheduled(_) => MessageKind::Scheduled,
            ClientFrame::Edit(_) => MessageKind::Edit,
            ClientFrame::Delete(_) => MessageKind::Delete,
            ClientFrame::Typing(_) => MessageKind::Typing,
            ClientFrame::TaskNotification(_) => MessageKind::TaskNotification,
            ClientFrame::PollNotification(_) => MessageKind::PollNotification,
            ClientFrame::CallOffer(_) => MessageKind::CallOffer,
            ClientFrame::CallAnswer(_) => MessageKind::CallAnswer,
            ClientFrame::CallReject(_) => MessageKind::CallReject,
            ClientFrame::CallEnd(_) => MessageKind::CallEnd,
            ClientFrame::CallBusy(_) => MessageKind::CallBusy,
            ClientFrame::IceCandidate(_) => MessageKind::IceCandidate,
            ClientFrame::ConferenceJoin(_) => MessageKind::ConferenceJoin,
            ClientFrame::ConferenceLeave(_) => MessageKind::ConferenceLeave,
            ClientFrame::ConferenceOffer(_) => MessageKind::ConferenceOffer,
            ClientFrame::ConferenceAnswer(_) => MessageKind::ConferenceAnswer,
            ClientFrame::ConferenceIce(_) => MessageKind::ConferenceIce,
            ClientFrame::KeyDistribution(_) => MessageKind::KeyDistribution,
        }
    }

    /// Check that the payload shape fits the declared type.
    ///
    /// Runs before any side effect; a failure means the frame is dropped.
    pub fn validate(&self) -> Result<(), DropReason> {
        match self {
            ClientFrame::Message(fields) => {
                validate_room(&fields.room)?;
                validate_content_common(fields)?;
                require(fields.has_body())
            }
            ClientFrame::Voice(fields) | ClientFrame::VideoNote(fields) => {
                validate_room(&fields.room)?;
                validate_content_common(fields)?;
                require(fields.file.is_some() || fields.has_encrypted())
            }
            ClientFrame::Scheduled(fields) => {
                validate_room(&fields.room)?;
                validate_content_common(fields)?;
                require(fields.has_body() && fields.scheduled_at.is_some())
            }
            ClientFrame::Edit(fields) => {
                validate_room(&fields.room)?;
                require(!fields.message_id.trim().is_empty() && !fields.text.trim().is_empty())
            }
            ClientFrame::Delete(fields) => {
                validate_room(&fields.room)?;
                require(!fields.message_id.trim().is_empty())
            }
            ClientFrame::Typing(fields) => validate_room(&fields.room),
            ClientFrame::TaskNotification(fields) | ClientFrame::PollNotification(fields) => {
                validate_room(&fields.room)
            }
            ClientFrame::CallOffer(fields)
            | ClientFrame::CallAnswer(fields)
            | ClientFrame::CallReject(fields)
            | ClientFrame::CallEnd(fields)
            | ClientFrame::CallBusy(fields)
            | ClientFrame::IceCandidate(fields)
            | ClientFrame::ConferenceOffer(fields)
            | ClientFrame::ConferenceAnswer(fields)
            | ClientFrame::ConferenceIce(fields)
            | ClientFrame::KeyDistribution(fields) => {
                let target = fields.target.trim();
                require(!target.is_empty() && target.len() <= MAX_TARGET_LEN)
            }
            ClientFrame::ConferenceJoin(_) | ClientFrame::ConferenceLeave(_) => Ok(()),
        }
    }
}

impl ContentFields {
    fn has_encrypted(&self) -> bool {
        self.encrypted.as_ref().is_some_and(|v| !v.is_null())
    }

    fn has_body(&self) -> bool {
        let has_text = self.text.as_ref().is_some_and(|t| !t.trim().is_empty());
        has_text || self.file.is_some() || self.has_encrypted()
    }
}

fn validate_room(room: &str) -> Result<(), DropReason> {
    require(!room.trim().is_empty() && room.len() <= MAX_ROOM_ID_LEN)
}

fn validate_content_common(fields: &ContentFields) -> Result<(), DropReason> {
    if let Some(file) = &fields.file {
        require(!file.url.trim().is_empty())?;
    }
    require(fields.ttl_seconds != Some(0))
}

fn require(condition: bool) -> Result<(), DropReason> {
    if condition {
        Ok(())
    } else {
        Err(DropReason::Invalid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const LIMIT: usize = 64 * 1024;

    #[test]
    fn test_parse_chat_message() {
        let frame = parse_frame(r#"{"type":"message","room":"r1","text":"hi"}"#, LIMIT).unwrap();
        assert_eq!(frame.kind(), MessageKind::Message);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_client_supplied_sender_and_timestamp_are_ignored() {
        let raw = r#"{"type":"message","room":"r1","text":"hi","sender":"mallory","timestamp":"1999-01-01T00:00:00Z"}"#;
        let frame = parse_frame(raw, LIMIT).unwrap();
        assert!(matches!(frame, ClientFrame::Message(ref f) if f.text.as_deref() == Some("hi")));
    }

    #[test]
    fn test_oversized_frame_dropped_before_parse() {
        let raw = format!(r#"{{"type":"message","room":"r1","text":"{}"}}"#, "x".repeat(100));
        assert_eq!(parse_frame(&raw, 50).unwrap_err(), DropReason::Oversized);
    }

    #[test]
    fn test_unknown_and_server_only_types_are_malformed() {
        for raw in [
            r#"{"type":"shout","room":"r1"}"#,
            r#"{"type":"join","room":"general"}"#,
            r#"{"type":"conference_peers","conference_id":"x"}"#,
            r#"not json"#,
            r#"{"room":"r1","text":"no type"}"#,
        ] {
            assert_eq!(parse_frame(raw, LIMIT).unwrap_err(), DropReason::Malformed, "{raw}");
        }
    }

    #[test]
    fn test_message_without_body_invalid() {
        let frame = parse_frame(r#"{"type":"message","room":"r1","text":"   "}"#, LIMIT).unwrap();
        assert_eq!(frame.validate().unwrap_err(), DropReason::Invalid);
    }

    #[test]
    fn test_encrypted_only_message_valid() {
        let raw = r#"{"type":"message","room":"r1","encrypted":{"ciphertext":"AAEC","iv":"BBB"}}"#;
        let frame = parse_frame(raw, LIMIT).unwrap();
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_voice_requires_file() {
        let raw = r#"{"type":"voice","room":"r1","text":"caption only"}"#;
        let frame = parse_frame(raw, LIMIT).unwrap();
        assert_eq!(frame.validate().unwrap_err(), DropReason::Invalid);

        let raw = r#"{"type":"voice","room":"r1","file":{"url":"/files/a.ogg","size":2048}}"#;
        let frame = parse_frame(raw, LIMIT).unwrap();
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_scheduled_requires_time() {
        let raw = r#"{"type":"scheduled","room":"r1","text":"later"}"#;
        let frame = parse_frame(raw, LIMIT).unwrap();
        assert_eq!(frame.validate().unwrap_err(), DropReason::Invalid);

        let raw = r#"{"type":"scheduled","room":"r1","text":"later","scheduled_at":"2030-01-01T09:00:00Z"}"#;
        assert!(parse_frame(raw, LIMIT).unwrap().validate().is_ok());
    }

    #[test]
    fn test_empty_room_invalid() {
        let frame = parse_frame(r#"{"type":"typing","room":""}"#, LIMIT).unwrap();
        assert_eq!(frame.validate().unwrap_err(), DropReason::Invalid);
    }

    #[test]
    fn test_typing_defaults_to_true() {
        let frame = parse_frame(r#"{"type":"typing","room":"r1"}"#, LIMIT).unwrap();
        assert!(matches!(frame, ClientFrame::Typing(TypingFields { is_typing: true, .. })));
    }

    #[test]
    fn test_relay_payload_optional_target_required() {
        let frame = parse_frame(r#"{"type":"call_end","target":"bob"}"#, LIMIT).unwrap();
        assert!(frame.validate().is_ok());

        let raw = r#"{"type":"call_offer","target":" ","payload":{}}"#;
        let frame = parse_frame(raw, LIMIT).unwrap();
        assert_eq!(frame.validate().unwrap_err(), DropReason::Invalid);
    }

    #[test]
    fn test_conference_join_requires_valid_id() {
        let raw = r#"{"type":"conference_join","conference_id":"nope"}"#;
        assert_eq!(parse_frame(raw, LIMIT).unwrap_err(), DropReason::Malformed);

        let raw = format!(
            r#"{{"type":"conference_join","conference_id":"{}"}}"#,
            ConferenceId::new()
        );
        assert!(parse_frame(&raw, LIMIT).unwrap().validate().is_ok());
    }

    #[test]
    fn test_conference_leave_ignores_extra_fields() {
        let raw = r#"{"type":"conference_leave","conference_id":"whatever"}"#;
        let frame = parse_frame(raw, LIMIT).unwrap();
        assert_eq!(frame.kind(), MessageKind::ConferenceLeave);
    }

    #[test]
    fn test_zero_ttl_invalid() {
        let raw = r#"{"type":"message","room":"r1","text":"x","ttl_seconds":0}"#;
        assert_eq!(
            parse_frame(raw, LIMIT).unwrap().validate().unwrap_err(),
            DropReason::Invalid
        );
    }

    #[test]
    fn test_truncation_boundary() {
        let exact = "a".repeat(10);
        assert_eq!(truncate_chars(exact.clone(), 10), exact);

        let over = "a".repeat(11);
        assert_eq!(truncate_chars(over, 10).chars().count(), 10);
    }

    #[test]
    fn test_truncation_respects_multibyte_characters() {
        let text = "привет мир".to_string();
        let truncated = truncate_chars(text, 6);
        assert_eq!(truncated, "привет");
    }
}
