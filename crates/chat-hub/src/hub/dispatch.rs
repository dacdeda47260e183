//! Inbound frame dispatch.
//!
//! Every frame is size-checked, parsed into a [`ClientFrame`] and validated
//! before any side effect. The match below is exhaustive over the frame
//! enum, so a new message kind does not compile until it is routed.

use super::{collaborator_failure, FanOut, Hub};
use crate::errors::DropReason;
use crate::observability::metrics as prom;
use crate::protocol::inbound::{
    ContentFields, DeleteFields, EditFields, NotificationFields, RelayFields, TypingFields,
};
use crate::protocol::{
    parse_frame, truncate_chars, ClientFrame, Envelope, EnvelopeBody, MessageKind,
};
use crate::registry::Session;
use crate::repositories::{NewMessage, StoredMessage};
use crate::services::push::{PushNotification, PREVIEW_CHARS};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

impl Hub {
    /// Handle one inbound text frame from `session`.
    ///
    /// A dropped frame has no side effects and is never reported to the
    /// sender. Frames from a connection that no longer owns the user's
    /// session are dropped.
    #[instrument(
        skip_all,
        name = "hub.dispatch",
        fields(username = %session.username, connection_id = %session.connection_id)
    )]
    pub async fn dispatch(&self, session: &Session, raw: &str) -> Result<FanOut, DropReason> {
        let started = Instant::now();

        if self
            .registry
            .session_for_connection(session.connection_id)
            .is_none()
        {
            return Err(self.dropped(None, DropReason::StaleConnection));
        }

        let frame = match parse_frame(raw, self.limits.max_frame_bytes) {
            Ok(frame) => frame,
            Err(reason) => return Err(self.dropped(None, reason)),
        };
        let kind = frame.kind();
        if let Err(reason) = frame.validate() {
            return Err(self.dropped(Some(kind), reason));
        }

        match self.route(session, frame).await {
            Ok(fan_out) => {
                self.metrics.record_dispatched();
                prom::record_frame(kind.as_str(), kind.class().as_str());
                prom::record_dispatch_latency(kind.as_str(), started.elapsed());
                debug!(
                    target: "hub.dispatch",
                    message_type = kind.as_str(),
                    message_class = kind.class().as_str(),
                    delivered = fan_out.delivered,
                    skipped = fan_out.skipped,
                    "Frame dispatched"
                );
                Ok(fan_out)
            }
            Err(reason) => Err(self.dropped(Some(kind), reason)),
        }
    }

    fn dropped(&self, kind: Option<MessageKind>, reason: DropReason) -> DropReason {
        self.metrics.record_dropped();
        prom::record_frame_dropped(reason.as_str());
        debug!(
            target: "hub.dispatch",
            message_type = kind.map_or("unknown", |k| k.as_str()),
            reason = reason.as_str(),
            "Frame dropped"
        );
        reason
    }

    async fn route(&self, session: &Session, frame: ClientFrame) -> Result<FanOut, DropReason> {
        let sender = session.username.as_str();

        match frame {
            ClientFrame::Message(fields) => {
                self.content(sender, MessageKind::Message, fields).await
            }
            ClientFrame::Voice(fields) => self.content(sender, MessageKind::Voice, fields).await,
            ClientFrame::VideoNote(fields) => {
                self.content(sender, MessageKind::VideoNote, fields).await
            }
            ClientFrame::Scheduled(fields) => {
                self.content(sender, MessageKind::Scheduled, fields).await
            }
            ClientFrame::Edit(fields) => self.edit(sender, fields).await,
            ClientFrame::Delete(fields) => self.delete(sender, fields).await,

            ClientFrame::Typing(TypingFields { room, is_typing }) => {
                self.presence(sender, MessageKind::Typing, room, EnvelopeBody::Typing { is_typing })
                    .await
            }
            ClientFrame::TaskNotification(NotificationFields { room, payload }) => {
                self.presence(
                    sender,
                    MessageKind::TaskNotification,
                    room,
                    EnvelopeBody::Notification { payload },
                )
                .await
            }
            ClientFrame::PollNotification(NotificationFields { room, payload }) => {
                self.presence(
                    sender,
                    MessageKind::PollNotification,
                    room,
                    EnvelopeBody::Notification { payload },
                )
                .await
            }

            ClientFrame::CallOffer(fields) => self.relay(sender, MessageKind::CallOffer, fields),
            ClientFrame::CallAnswer(fields) => self.relay(sender, MessageKind::CallAnswer, fields),
            ClientFrame::CallReject(fields) => self.relay(sender, MessageKind::CallReject, fields),
            ClientFrame::CallEnd(fields) => self.relay(sender, MessageKind::CallEnd, fields),
            ClientFrame::CallBusy(fields) => self.relay(sender, MessageKind::CallBusy, fields),
            ClientFrame::IceCandidate(fields) => {
                self.relay(sender, MessageKind::IceCandidate, fields)
            }
            ClientFrame::KeyDistribution(fields) => {
                self.relay(sender, MessageKind::KeyDistribution, fields)
            }

            ClientFrame::ConferenceJoin(fields) => self
                .join_conference_notified(fields.conference_id, sender)
                .await
                .map(|(_, fan_out)| fan_out)
                .map_err(DropReason::from),
            ClientFrame::ConferenceLeave(_) => self
                .leave_conference_notified(sender)
                .await
                .map(|(_, fan_out)| fan_out)
                .map_err(DropReason::from),
            ClientFrame::ConferenceOffer(fields) => {
                self.conference_relay(sender, MessageKind::ConferenceOffer, fields)
                    .await
            }
            ClientFrame::ConferenceAnswer(fields) => {
                self.conference_relay(sender, MessageKind::ConferenceAnswer, fields)
                    .await
            }
            ClientFrame::ConferenceIce(fields) => {
                self.conference_relay(sender, MessageKind::ConferenceIce, fields)
                    .await
            }
        }
    }

    /// Persist a content frame, then fan it out.
    ///
    /// `scheduled` frames are only echoed to the sender; the scheduled
    /// delivery task fans them out once due.
    async fn content(
        &self,
        sender: &str,
        kind: MessageKind,
        fields: ContentFields,
    ) -> Result<FanOut, DropReason> {
        self.authorize(&fields.room, sender).await?;

        let now = Utc::now();
        // A scheduled message's lifetime starts when it is released.
        let visible_from = fields.scheduled_at.filter(|at| *at > now).unwrap_or(now);
        let expires_at = match fields.ttl_seconds {
            Some(ttl) => Some(expiry(visible_from, ttl).ok_or(DropReason::Invalid)?),
            None => None,
        };
        let text = fields
            .text
            .map(|t| truncate_chars(t, self.limits.max_content_chars));

        let stored = self
            .collaborators
            .messages
            .save(NewMessage {
                room: fields.room,
                sender: sender.to_string(),
                kind,
                text,
                file: fields.file,
                encrypted: fields.encrypted,
                extra: fields.extra,
                scheduled_at: fields.scheduled_at,
                expires_at,
                created_at: now,
            })
            .await
            .map_err(collaborator_failure)?;

        let envelope = Envelope::new(
            kind,
            sender,
            Some(stored.room.clone()),
            now,
            EnvelopeBody::Content(stored.content_body()),
        );

        if kind == MessageKind::Scheduled {
            return Ok(FanOut::single(self.send(sender, &envelope)));
        }

        let fan_out = self.fan_out(&stored.room, &envelope, None).await?;
        if kind.notifies_offline() {
            self.push_offline(&stored);
        }
        Ok(fan_out)
    }

    async fn edit(&self, sender: &str, fields: EditFields) -> Result<FanOut, DropReason> {
        self.authorize(&fields.room, sender).await?;
        self.owned_message(sender, &fields.room, &fields.message_id)
            .await?;

        let text = truncate_chars(fields.text, self.limits.max_content_chars);
        self.collaborators
            .messages
            .update_text(&fields.message_id, &text)
            .await
            .map_err(collaborator_failure)?;

        let envelope = Envelope::new(
            MessageKind::Edit,
            sender,
            Some(fields.room.clone()),
            Utc::now(),
            EnvelopeBody::Edit {
                message_id: fields.message_id,
                text,
            },
        );
        self.fan_out(&fields.room, &envelope, None).await
    }

    async fn delete(&self, sender: &str, fields: DeleteFields) -> Result<FanOut, DropReason> {
        self.authorize(&fields.room, sender).await?;
        self.owned_message(sender, &fields.room, &fields.message_id)
            .await?;

        self.collaborators
            .messages
            .delete(&fields.message_id)
            .await
            .map_err(collaborator_failure)?;

        let envelope = Envelope::new(
            MessageKind::Delete,
            sender,
            Some(fields.room.clone()),
            Utc::now(),
            EnvelopeBody::Delete {
                message_id: fields.message_id,
            },
        );
        self.fan_out(&fields.room, &envelope, None).await
    }

    /// Re-read the original message and check that `sender` wrote it.
    async fn owned_message(
        &self,
        sender: &str,
        room: &str,
        message_id: &str,
    ) -> Result<StoredMessage, DropReason> {
        let original = self
            .collaborators
            .messages
            .find(message_id)
            .await
            .map_err(collaborator_failure)?
            .filter(|m| m.room == room)
            .ok_or(DropReason::UnknownMessage)?;

        if original.sender != sender {
            return Err(DropReason::NotOwner);
        }
        Ok(original)
    }

    async fn presence(
        &self,
        sender: &str,
        kind: MessageKind,
        room: String,
        body: EnvelopeBody,
    ) -> Result<FanOut, DropReason> {
        self.authorize(&room, sender).await?;
        let envelope = Envelope::new(kind, sender, Some(room.clone()), Utc::now(), body);
        self.fan_out(&room, &envelope, Some(sender)).await
    }

    /// Point-to-point relay. The payload is passed through untouched.
    fn relay(
        &self,
        sender: &str,
        kind: MessageKind,
        fields: RelayFields,
    ) -> Result<FanOut, DropReason> {
        let target = fields.target.trim().to_string();
        if target == sender {
            return Err(DropReason::Invalid);
        }

        let envelope = Envelope::new(
            kind,
            sender,
            None,
            Utc::now(),
            EnvelopeBody::Relay {
                target: target.clone(),
                payload: fields.payload,
            },
        );
        Ok(FanOut::single(self.send(&target, &envelope)))
    }

    /// Relay between two participants of the same conference.
    async fn conference_relay(
        &self,
        sender: &str,
        kind: MessageKind,
        fields: RelayFields,
    ) -> Result<FanOut, DropReason> {
        let target = fields.target.trim().to_string();
        if target == sender {
            return Err(DropReason::Invalid);
        }

        let conference = self
            .conferences
            .conference_of(sender)
            .await
            .map_err(collaborator_failure)?
            .filter(|c| c.participants.contains(&target))
            .ok_or(DropReason::NotConferencePeer)?;

        let envelope = Envelope::new(
            kind,
            sender,
            None,
            Utc::now(),
            EnvelopeBody::ConferenceRelay {
                conference_id: conference.conference_id,
                target: target.clone(),
                payload: fields.payload,
            },
        );
        Ok(FanOut::single(self.send(&target, &envelope)))
    }

    /// Hand offline room members to the push notifier on a detached task.
    pub(super) fn push_offline(&self, message: &StoredMessage) {
        if message.room == self.limits.public_room {
            return;
        }

        let rooms = Arc::clone(&self.collaborators.rooms);
        let push = Arc::clone(&self.collaborators.push);
        let registry = Arc::clone(&self.registry);
        let preview = match (&message.text, &message.encrypted) {
            (Some(text), None) => Some(truncate_chars(text.clone(), PREVIEW_CHARS)),
            _ => None,
        };
        let room = message.room.clone();
        let sender = message.sender.clone();
        let kind = message.kind;

        tokio::spawn(async move {
            let members = match rooms.member_usernames(&room).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(target: "hub.push", error = %e, "Could not list room members for push");
                    return;
                }
            };

            for recipient in members {
                if recipient == sender || registry.is_online(&recipient) {
                    continue;
                }
                let notification = PushNotification {
                    recipient,
                    sender: sender.clone(),
                    room: room.clone(),
                    kind,
                    preview: preview.clone(),
                };
                if let Err(e) = push.notify(notification).await {
                    debug!(target: "hub.push", error = %e, "Push notification failed");
                }
            }
        });
    }
}

/// `now + ttl`, or `None` if it does not fit.
fn expiry(now: DateTime<Utc>, ttl_seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(ttl_seconds).ok()?;
    now.checked_add_signed(chrono::Duration::try_seconds(seconds)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::RoomKind;
    use crate::test_support::{connect, fixture, Fixture};
    use crate::transport::SinkReceiver;
    use serde_json::json;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_millis(200);
    const QUIET: Duration = Duration::from_millis(50);

    /// alice and bob share private room r1; carol is outside it.
    async fn three_users() -> (Fixture, Vec<(Session, SinkReceiver)>) {
        let f = fixture();
        f.rooms
            .create_room("r1", RoomKind::Private, "alice", ["bob"])
            .await;
        let mut users = Vec::new();
        for token in ["tok-alice", "tok-bob", "tok-carol"] {
            users.push(connect(&f.hub, token).await);
        }
        for (_, rx) in &mut users {
            tokio::time::sleep(Duration::from_millis(10)).await;
            rx.drain();
        }
        (f, users)
    }

    #[tokio::test]
    async fn test_message_reaches_members_only() {
        let (f, mut users) = three_users().await;
        let frame = json!({"type": "message", "room": "r1", "text": "hi"}).to_string();
        let alice = users.first().unwrap().0.clone();

        let fan_out = f.hub.dispatch(&alice, &frame).await.unwrap();
        assert_eq!(fan_out.delivered, 2);

        let bob_rx = &mut users.get_mut(1).unwrap().1;
        let received = bob_rx.next_json(WAIT).await.unwrap();
        assert_eq!(received["type"], "message");
        assert_eq!(received["sender"], "alice");
        assert_eq!(received["text"], "hi");

        let carol_rx = &mut users.get_mut(2).unwrap().1;
        assert!(carol_rx.next_event(QUIET).await.is_none());
    }

    #[tokio::test]
    async fn test_non_member_frame_is_dropped_and_not_persisted() {
        let (f, mut users) = three_users().await;
        let carol = users.get(2).unwrap().0.clone();
        let frame = json!({"type": "message", "room": "r1", "text": "sneaky"}).to_string();

        let result = f.hub.dispatch(&carol, &frame).await;

        assert_eq!(result, Err(DropReason::NotMember));
        assert!(f.messages.in_room("r1").await.is_empty());
        let bob_rx = &mut users.get_mut(1).unwrap().1;
        assert!(bob_rx.next_event(QUIET).await.is_none());
    }

    #[tokio::test]
    async fn test_client_supplied_sender_is_ignored() {
        let (f, mut users) = three_users().await;
        let bob = users.get(1).unwrap().0.clone();
        let frame = json!({
            "type": "message",
            "room": "r1",
            "text": "hello",
            "sender": "alice",
            "timestamp": "1999-01-01T00:00:00Z"
        })
        .to_string();

        f.hub.dispatch(&bob, &frame).await.unwrap();

        let alice_rx = &mut users.get_mut(0).unwrap().1;
        let received = alice_rx.next_json(WAIT).await.unwrap();
        assert_eq!(received["sender"], "bob");
        assert_ne!(received["timestamp"], "1999-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_edit_requires_ownership() {
        let (f, users) = three_users().await;
        let alice = users.first().unwrap().0.clone();
        let bob = users.get(1).unwrap().0.clone();

        let frame = json!({"type": "message", "room": "r1", "text": "original"}).to_string();
        f.hub.dispatch(&alice, &frame).await.unwrap();
        let id = f.messages.in_room("r1").await.first().unwrap().id.clone();

        let edit = json!({"type": "edit", "room": "r1", "message_id": id, "text": "hijack"});
        assert_eq!(
            f.hub.dispatch(&bob, &edit.to_string()).await,
            Err(DropReason::NotOwner)
        );

        let edit = json!({"type": "edit", "room": "r1", "message_id": id, "text": "fixed"});
        f.hub.dispatch(&alice, &edit.to_string()).await.unwrap();
        let stored = f.messages.in_room("r1").await;
        assert_eq!(stored.first().unwrap().text.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn test_delete_of_message_from_other_room_is_unknown() {
        let (f, users) = three_users().await;
        let alice = users.first().unwrap().0.clone();
        f.rooms
            .create_room("notes", RoomKind::Notes, "alice", Vec::<String>::new())
            .await;

        let frame = json!({"type": "message", "room": "notes", "text": "mine"}).to_string();
        f.hub.dispatch(&alice, &frame).await.unwrap();
        let id = f.messages.in_room("notes").await.first().unwrap().id.clone();

        let delete = json!({"type": "delete", "room": "r1", "message_id": id});
        assert_eq!(
            f.hub.dispatch(&alice, &delete.to_string()).await,
            Err(DropReason::UnknownMessage)
        );
        assert_eq!(f.messages.in_room("notes").await.len(), 1);
    }

    #[tokio::test]
    async fn test_typing_excludes_sender() {
        let (f, mut users) = three_users().await;
        let alice = users.first().unwrap().0.clone();
        let frame = json!({"type": "typing", "room": "r1"}).to_string();

        let fan_out = f.hub.dispatch(&alice, &frame).await.unwrap();
        assert_eq!(fan_out.delivered, 1);

        let alice_rx = &mut users.get_mut(0).unwrap().1;
        assert!(alice_rx.next_event(QUIET).await.is_none());
        let bob_rx = &mut users.get_mut(1).unwrap().1;
        let received = bob_rx.next_json(WAIT).await.unwrap();
        assert_eq!(received["is_typing"], true);
    }

    #[tokio::test]
    async fn test_scheduled_is_echoed_to_sender_only() {
        let (f, mut users) = three_users().await;
        let alice = users.first().unwrap().0.clone();
        let frame = json!({
            "type": "scheduled",
            "room": "r1",
            "text": "later",
            "scheduled_at": "2999-01-01T00:00:00Z"
        })
        .to_string();

        f.hub.dispatch(&alice, &frame).await.unwrap();

        let alice_rx = &mut users.get_mut(0).unwrap().1;
        assert_eq!(alice_rx.next_json(WAIT).await.unwrap()["type"], "scheduled");
        let bob_rx = &mut users.get_mut(1).unwrap().1;
        assert!(bob_rx.next_event(QUIET).await.is_none());
    }

    #[tokio::test]
    async fn test_replaced_connection_cannot_send() {
        let (f, mut users) = three_users().await;
        let stale = users.first().unwrap().0.clone();
        let (_fresh, _fresh_rx) = connect(&f.hub, "tok-alice").await;
        let bob_rx = &mut users.get_mut(1).unwrap().1;
        tokio::time::sleep(Duration::from_millis(10)).await;
        bob_rx.drain();

        let frame = json!({"type": "message", "room": "r1", "text": "ghost"}).to_string();
        assert_eq!(
            f.hub.dispatch(&stale, &frame).await,
            Err(DropReason::StaleConnection)
        );
        assert!(bob_rx.next_event(QUIET).await.is_none());
        assert!(f.messages.in_room("r1").await.is_empty());
    }

    #[tokio::test]
    async fn test_call_relay_to_self_is_invalid() {
        let (f, _users) = three_users().await;
        let alice = f.hub.registry().session("alice").unwrap();
        let frame = json!({"type": "call_offer", "target": "alice", "payload": {}}).to_string();

        assert_eq!(
            f.hub.dispatch(&alice, &frame).await,
            Err(DropReason::Invalid)
        );
    }

    #[tokio::test]
    async fn test_call_offer_relayed_with_opaque_payload() {
        let (f, mut users) = three_users().await;
        let alice = users.first().unwrap().0.clone();
        let frame = json!({
            "type": "call_offer",
            "target": "carol",
            "payload": {"sdp": "v=0", "nested": [1, 2]}
        })
        .to_string();

        f.hub.dispatch(&alice, &frame).await.unwrap();

        let carol_rx = &mut users.get_mut(2).unwrap().1;
        let received = carol_rx.next_json(WAIT).await.unwrap();
        assert_eq!(received["type"], "call_offer");
        assert_eq!(received["payload"]["nested"][1], 2);
        assert!(received.get("room").is_none());
    }

    #[tokio::test]
    async fn test_conference_relay_requires_shared_conference() {
        let (f, _users) = three_users().await;
        let alice = f.hub.registry().session("alice").unwrap();
        let frame =
            json!({"type": "conference_offer", "target": "bob", "payload": {}}).to_string();

        assert_eq!(
            f.hub.dispatch(&alice, &frame).await,
            Err(DropReason::NotConferencePeer)
        );

        let info = f.hub.create_conference("alice", None).await.unwrap();
        f.hub.join_conference(info.conference_id, "bob").await.unwrap();
        assert!(f.hub.dispatch(&alice, &frame).await.is_ok());
    }

    #[tokio::test]
    async fn test_oversized_and_malformed_frames_dropped() {
        let (f, _users) = three_users().await;
        let alice = f.hub.registry().session("alice").unwrap();

        let big = "x".repeat(f.hub.limits().max_frame_bytes + 1);
        assert_eq!(
            f.hub.dispatch(&alice, &big).await,
            Err(DropReason::Oversized)
        );
        assert_eq!(
            f.hub.dispatch(&alice, "{not json").await,
            Err(DropReason::Malformed)
        );
        assert_eq!(
            f.hub.dispatch(&alice, r#"{"type":"join"}"#).await,
            Err(DropReason::Malformed)
        );
        assert_eq!(f.hub.metrics().frames_dropped(), 3);
    }

    #[tokio::test]
    async fn test_offline_members_are_pushed() {
        let f = fixture();
        f.rooms
            .create_room("g1", RoomKind::Group, "alice", ["bob", "carol"])
            .await;
        let (alice, _rx) = connect(&f.hub, "tok-alice").await;
        let frame = json!({"type": "message", "room": "g1", "text": "ping"}).to_string();

        f.hub.dispatch(&alice, &frame).await.unwrap();

        for _ in 0..50 {
            if f.push.sent().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(f.push.recipients(), vec!["bob", "carol"]);
        assert_eq!(
            f.push.sent().first().unwrap().preview.as_deref(),
            Some("ping")
        );
    }

    #[test]
    fn test_expiry_bounds() {
        let now = Utc::now();
        assert_eq!(
            expiry(now, 60).unwrap(),
            now + chrono::Duration::seconds(60)
        );
        assert!(expiry(now, u64::MAX).is_none());
    }
}
