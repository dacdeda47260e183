//! Hub fixture for unit tests inside this crate.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::actors::HubMetrics;
use crate::auth::mock::StaticIdentityValidator;
use crate::hub::{Collaborators, Hub, HubLimits};
use crate::registry::Session;
use crate::repositories::{
    InMemoryMessageStore, InMemoryPresenceStore, InMemoryRoomDirectory, MessageStore,
    PresenceStore, RoomDirectory,
};
use crate::services::push::mock::RecordingPushNotifier;
use crate::services::PushNotifier;
use crate::transport::{ChannelSink, SinkReceiver};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) struct Fixture {
    pub hub: Hub,
    pub rooms: Arc<InMemoryRoomDirectory>,
    pub messages: Arc<InMemoryMessageStore>,
    pub presence: Arc<InMemoryPresenceStore>,
    pub push: Arc<RecordingPushNotifier>,
}

/// Hub that accepts `tok-<name>` for alice, bob and carol.
pub(crate) fn fixture() -> Fixture {
    let rooms = Arc::new(InMemoryRoomDirectory::new());
    let messages = Arc::new(InMemoryMessageStore::new());
    let presence = Arc::new(InMemoryPresenceStore::new());
    let push = Arc::new(RecordingPushNotifier::new());

    let hub = hub_with(
        Arc::clone(&rooms) as Arc<dyn RoomDirectory>,
        Arc::clone(&messages) as Arc<dyn MessageStore>,
        Arc::clone(&presence) as Arc<dyn PresenceStore>,
        Arc::clone(&push) as Arc<dyn PushNotifier>,
    );

    Fixture {
        hub,
        rooms,
        messages,
        presence,
        push,
    }
}

/// Hub over the given stores, accepting the same tokens as [`fixture`].
pub(crate) fn hub_with(
    rooms: Arc<dyn RoomDirectory>,
    messages: Arc<dyn MessageStore>,
    presence: Arc<dyn PresenceStore>,
    push: Arc<dyn PushNotifier>,
) -> Hub {
    let identity = ["alice", "bob", "carol"]
        .iter()
        .fold(StaticIdentityValidator::new(), |v, name| {
            v.with_token(&format!("tok-{name}"), name)
        });

    let collaborators = Collaborators {
        identity: Arc::new(identity),
        rooms,
        messages,
        presence,
        push,
    };
    Hub::new(
        collaborators,
        HubLimits::default(),
        HubMetrics::new(),
        CancellationToken::new(),
    )
}

pub(crate) async fn connect(hub: &Hub, token: &str) -> (Session, SinkReceiver) {
    let (sink, rx) = ChannelSink::pair();
    let session = hub.connect(Some(token), Box::new(sink)).await.unwrap();
    (session, rx)
}
