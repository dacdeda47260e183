//! In-process hub with in-memory collaborators.
//!
//! Connections use channel-backed sinks, so the whole lifecycle can be
//! driven without a socket.

use crate::tokens::{mint_token, TEST_JWT_SECRET};
use chat_hub::actors::HubMetrics;
use chat_hub::auth::JwtIdentityValidator;
use chat_hub::hub::{Collaborators, Hub, HubLimits};
use chat_hub::registry::Session;
use chat_hub::repositories::{
    InMemoryMessageStore, InMemoryPresenceStore, InMemoryRoomDirectory, RoomKind,
};
use chat_hub::services::push::mock::RecordingPushNotifier;
use chat_hub::transport::{ChannelSink, SinkReceiver};
use common::secret::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long helpers wait for a frame that should arrive.
pub const FRAME_WAIT: Duration = Duration::from_millis(500);

/// How long helpers wait before concluding nothing will arrive.
pub const QUIET_WAIT: Duration = Duration::from_millis(100);

/// A hub plus handles on every in-memory collaborator it uses.
pub struct TestHub {
    pub hub: Hub,
    pub rooms: Arc<InMemoryRoomDirectory>,
    pub messages: Arc<InMemoryMessageStore>,
    pub presence: Arc<InMemoryPresenceStore>,
    pub push: Arc<RecordingPushNotifier>,
    pub cancel_token: CancellationToken,
}

impl TestHub {
    /// Hub with default limits and the public room seeded as `General`.
    pub async fn new() -> Self {
        Self::with_limits(HubLimits::default()).await
    }

    pub async fn with_limits(limits: HubLimits) -> Self {
        let rooms = Arc::new(InMemoryRoomDirectory::new());
        rooms
            .create_room(
                &limits.public_room,
                RoomKind::General,
                "system",
                Vec::<String>::new(),
            )
            .await;
        let messages = Arc::new(InMemoryMessageStore::new());
        let presence = Arc::new(InMemoryPresenceStore::new());
        let push = Arc::new(RecordingPushNotifier::new());

        let collaborators = Collaborators {
            identity: Arc::new(JwtIdentityValidator::new(
                &SecretString::from(TEST_JWT_SECRET.to_string()),
                Duration::from_secs(300),
            )),
            rooms: rooms.clone(),
            messages: messages.clone(),
            presence: presence.clone(),
            push: push.clone(),
        };

        let cancel_token = CancellationToken::new();
        let hub = Hub::new(
            collaborators,
            limits,
            HubMetrics::new(),
            cancel_token.child_token(),
        );

        Self {
            hub,
            rooms,
            messages,
            presence,
            push,
            cancel_token,
        }
    }

    /// Connect `username` with a freshly minted token.
    pub async fn connect(&self, username: &str) -> (Session, SinkReceiver) {
        self.connect_with_token(Some(&mint_token(username)))
            .await
            .expect("connect should succeed with a minted token")
    }

    pub async fn connect_with_token(
        &self,
        token: Option<&str>,
    ) -> Result<(Session, SinkReceiver), (chat_hub::errors::HubError, SinkReceiver)> {
        let (sink, rx) = ChannelSink::pair();
        match self.hub.connect(token, Box::new(sink)).await {
            Ok(session) => Ok((session, rx)),
            Err(e) => Err((e, rx)),
        }
    }

    /// Connect `username` and discard the presence frames that arrive
    /// during setup.
    pub async fn connect_quiet(&self, username: &str) -> (Session, SinkReceiver) {
        let (session, mut rx) = self.connect(username).await;
        settle().await;
        rx.drain();
        (session, rx)
    }

    /// Create a private room whose members are `members`.
    pub async fn private_room(&self, room: &str, members: &[&str]) {
        let creator = members.first().copied().unwrap_or("system");
        self.rooms
            .create_room(room, RoomKind::Private, creator, members.iter().copied())
            .await;
    }

    pub async fn group_room(&self, room: &str, members: &[&str]) {
        let creator = members.first().copied().unwrap_or("system");
        self.rooms
            .create_room(room, RoomKind::Group, creator, members.iter().copied())
            .await;
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Let spawned actors drain their mailboxes.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
