//! The closed set of message kinds carried over the hub.

use serde::{Deserialize, Serialize};

/// Every frame type the hub knows about.
///
/// Inbound frames are parsed into [`super::ClientFrame`]; this enum is the
/// tag written on outbound envelopes and used for metric labels. Adding a
/// variant forces every `match` below to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    // Content
    Message,
    Voice,
    VideoNote,
    Scheduled,
    Edit,
    Delete,
    // Presence
    Join,
    Leave,
    Typing,
    TaskNotification,
    PollNotification,
    // 1:1 call signaling
    CallOffer,
    CallAnswer,
    CallReject,
    CallEnd,
    CallBusy,
    IceCandidate,
    // Conference signaling
    ConferenceJoin,
    ConferenceLeave,
    ConferencePeers,
    ConferenceOffer,
    ConferenceAnswer,
    ConferenceIce,
    // End-to-end key material
    KeyDistribution,
}

/// Behavioral class of a message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Persisted, room-authorized, fanned out to the room.
    Content,
    /// Room-authorized, fanned out, never persisted.
    Presence,
    /// Relayed to one named peer.
    CallSignal,
    /// Handled by the conference state machine or relayed to a conference peer.
    Conference,
    /// Opaque key material relayed to one named user.
    KeyRelay,
}

impl MessageClass {
    /// Bounded metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageClass::Content => "content",
            MessageClass::Presence => "presence",
            MessageClass::CallSignal => "call_signal",
            MessageClass::Conference => "conference",
            MessageClass::KeyRelay => "key_relay",
        }
    }
}

impl MessageKind {
    /// Returns the wire tag, also used as a bounded metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Message => "message",
            MessageKind::Voice => "voice",
            MessageKind::VideoNote => "video_note",
            MessageKind::Scheduled => "scheduled",
            MessageKind::Edit => "edit",
            MessageKind::Delete => "delete",
            MessageKind::Join => "join",
            MessageKind::Leave => "leave",
            MessageKind::Typing => "typing",
            MessageKind::TaskNotification => "task_notification",
            MessageKind::PollNotification => "poll_notification",
            MessageKind::CallOffer => "call_offer",
            MessageKind::CallAnswer => "call_answer",
            MessageKind::CallReject => "call_reject",
            MessageKind::CallEnd => "call_end",
            MessageKind::CallBusy => "call_busy",
            MessageKind::IceCandidate => "ice_candidate",
            MessageKind::ConferenceJoin => "conference_join",
            MessageKind::ConferenceLeave => "conference_leave",
            MessageKind::ConferencePeers => "conference_peers",
            MessageKind::ConferenceOffer => "conference_offer",
            MessageKind::ConferenceAnswer => "conference_answer",
            MessageKind::ConferenceIce => "conference_ice",
            MessageKind::KeyDistribution => "key_distribution",
        }
    }

    /// Returns the behavioral class that decides how the hub routes this kind.
    #[must_use]
    pub const fn class(&self) -> MessageClass {
        match self {
            MessageKind::Message
            | MessageKind::Voice
            | MessageKind::VideoNote
            | MessageKind::Scheduled
            | MessageKind::Edit
            | MessageKind::Delete => MessageClass::Content,
            MessageKind::Join
            | MessageKind::Leave
            | MessageKind::Typing
            | MessageKind::TaskNotification
            | MessageKind::PollNotification => MessageClass::Presence,
            MessageKind::CallOffer
            | MessageKind::CallAnswer
            | MessageKind::CallReject
            | MessageKind::CallEnd
            | MessageKind::CallBusy
            | MessageKind::IceCandidate => MessageClass::CallSignal,
            MessageKind::ConferenceJoin
            | MessageKind::ConferenceLeave
            | MessageKind::ConferencePeers
            | MessageKind::ConferenceOffer
            | MessageKind::ConferenceAnswer
            | MessageKind::ConferenceIce => MessageClass::Conference,
            MessageKind::KeyDistribution => MessageClass::KeyRelay,
        }
    }

    /// Whether offline room members get a push notification for this kind.
    #[must_use]
    pub const fn notifies_offline(&self) -> bool {
        matches!(
            self,
            MessageKind::Message | MessageKind::Voice | MessageKind::VideoNote
        )
    }
}
