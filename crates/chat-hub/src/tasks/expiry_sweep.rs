//! Expiry sweep background task.
//!
//! Messages sent with a `ttl_seconds` carry an `expires_at`. This task
//! purges them from the store once that time passes and tells the room
//! with a `delete` envelope.

use crate::hub::Hub;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Start the expiry sweep background task.
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "hub.task.expiry_sweep")]
pub async fn start_expiry_sweep(hub: Hub, interval: Duration, cancel_token: CancellationToken) {
    info!(
        target: "hub.task.expiry_sweep",
        interval_ms = interval.as_millis() as u64,
        "Starting expiry sweep task"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match hub.purge_expired(Utc::now()).await {
                    Ok(0) => {}
                    Ok(purged) => {
                        debug!(target: "hub.task.expiry_sweep", purged, "Purged expired messages");
                    }
                    Err(e) => {
                        error!(
                            target: "hub.task.expiry_sweep",
                            error = %e,
                            "Failed to purge expired messages"
                        );
                    }
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "hub.task.expiry_sweep",
                    "Expiry sweep task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "hub.task.expiry_sweep", "Expiry sweep task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::protocol::MessageKind;
    use crate::repositories::{MessageStore, NewMessage, RoomKind};
    use crate::test_support::{connect, fixture};
    use serde_json::json;

    #[tokio::test]
    async fn test_sweep_announces_delete_to_room() {
        let f = fixture();
        f.rooms
            .create_room("r1", RoomKind::Private, "alice", ["bob"])
            .await;
        let (alice, _alice_rx) = connect(&f.hub, "tok-alice").await;
        let (_bob, mut bob_rx) = connect(&f.hub, "tok-bob").await;

        let frame = json!({"type": "message", "room": "r1", "text": "gone soon", "ttl_seconds": 1});
        f.hub.dispatch(&alice, &frame.to_string()).await.unwrap();
        let id = f.messages.in_room("r1").await.first().unwrap().id.clone();
        tokio::time::sleep(Duration::from_millis(10)).await;
        bob_rx.drain();

        let later = Utc::now() + chrono::Duration::seconds(2);
        assert_eq!(f.hub.purge_expired(later).await.unwrap(), 1);

        let deleted = bob_rx.next_json(Duration::from_millis(200)).await.unwrap();
        assert_eq!(deleted["type"], "delete");
        assert_eq!(deleted["message_id"], id.as_str());
        assert!(f.messages.in_room("r1").await.is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_message_lifetime_starts_at_release() {
        let f = fixture();
        f.rooms
            .create_room("r1", RoomKind::Private, "alice", ["bob"])
            .await;
        let (alice, _alice_rx) = connect(&f.hub, "tok-alice").await;
        let (_bob, mut bob_rx) = connect(&f.hub, "tok-bob").await;

        let release = Utc::now() + chrono::Duration::hours(1);
        let frame = json!({
            "type": "scheduled",
            "room": "r1",
            "text": "see you later",
            "scheduled_at": release.to_rfc3339(),
            "ttl_seconds": 60
        });
        f.hub.dispatch(&alice, &frame.to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        bob_rx.drain();

        let stored = f.messages.in_room("r1").await.first().unwrap().clone();
        let scheduled_at = stored.scheduled_at.unwrap();
        assert_eq!(
            stored.expires_at,
            Some(scheduled_at + chrono::Duration::seconds(60))
        );

        // Past the ttl measured from receipt, but not yet released.
        let before_release = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(f.hub.purge_expired(before_release).await.unwrap(), 0);
        assert!(bob_rx.next_event(Duration::from_millis(50)).await.is_none());

        assert_eq!(f.hub.deliver_due_scheduled(scheduled_at).await.unwrap(), 1);
        let released = bob_rx.next_json(Duration::from_millis(200)).await.unwrap();
        assert_eq!(released["type"], "message");

        let after_ttl = scheduled_at + chrono::Duration::seconds(61);
        assert_eq!(f.hub.purge_expired(after_ttl).await.unwrap(), 1);
        let deleted = bob_rx.next_json(Duration::from_millis(200)).await.unwrap();
        assert_eq!(deleted["type"], "delete");
    }

    #[tokio::test]
    async fn test_task_purges_already_expired_messages() {
        let f = fixture();
        f.rooms
            .create_room("r1", RoomKind::Private, "alice", ["bob"])
            .await;
        let (_bob, mut bob_rx) = connect(&f.hub, "tok-bob").await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        bob_rx.drain();

        let now = Utc::now();
        f.messages
            .save(NewMessage {
                room: "r1".to_string(),
                sender: "alice".to_string(),
                kind: MessageKind::Message,
                text: Some("stale".to_string()),
                file: None,
                encrypted: None,
                extra: None,
                scheduled_at: None,
                expires_at: Some(now - chrono::Duration::seconds(1)),
                created_at: now - chrono::Duration::seconds(60),
            })
            .await
            .unwrap();

        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(start_expiry_sweep(
            f.hub.clone(),
            Duration::from_millis(20),
            cancel_token.clone(),
        ));

        let deleted = bob_rx.next_json(Duration::from_secs(1)).await.unwrap();
        assert_eq!(deleted["type"], "delete");
        assert!(f.messages.in_room("r1").await.is_empty());

        cancel_token.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpired_messages_survive_sweep() {
        let f = fixture();
        f.rooms
            .create_room("r1", RoomKind::Private, "alice", ["bob"])
            .await;
        let (alice, _alice_rx) = connect(&f.hub, "tok-alice").await;

        let frame = json!({"type": "message", "room": "r1", "text": "keep", "ttl_seconds": 3600});
        f.hub.dispatch(&alice, &frame.to_string()).await.unwrap();

        assert_eq!(f.hub.purge_expired(Utc::now()).await.unwrap(), 0);
        assert_eq!(f.messages.in_room("r1").await.len(), 1);
    }
}
