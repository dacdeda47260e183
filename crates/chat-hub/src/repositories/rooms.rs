//! Room directory: room existence, kind and membership.
//!
//! Rooms are managed elsewhere; the hub only reads them. Every call goes
//! straight to the directory so membership changes are seen on the next
//! frame, with nothing cached inside the hub.

use crate::errors::HubError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Room kinds known to the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    /// Broadcast to every registered session.
    General,
    /// 1:1 conversation.
    Private,
    /// Multi-member group.
    Group,
    /// A user's notes to self.
    Notes,
}

/// Read-only view of the room directory.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn is_member(&self, room: &str, username: &str) -> Result<bool, HubError>;

    /// Kind of `room`, or `None` if it does not exist.
    async fn room_kind(&self, room: &str) -> Result<Option<RoomKind>, HubError>;

    /// Members of `room`. Empty for an unknown room.
    async fn member_usernames(&self, room: &str) -> Result<Vec<String>, HubError>;
}

#[derive(Debug, Clone)]
struct RoomRecord {
    kind: RoomKind,
    creator: String,
    members: HashSet<String>,
}

/// Directory kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRoomDirectory {
    rooms: RwLock<HashMap<String, RoomRecord>>,
}

impl InMemoryRoomDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace `room`. The creator is always a member.
    pub async fn create_room<I, S>(&self, room: &str, kind: RoomKind, creator: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members: HashSet<String> = members.into_iter().map(Into::into).collect();
        members.insert(creator.to_string());

        self.rooms.write().await.insert(
            room.to_string(),
            RoomRecord {
                kind,
                creator: creator.to_string(),
                members,
            },
        );
    }

    /// Returns false if the room does not exist.
    pub async fn add_member(&self, room: &str, username: &str) -> bool {
        match self.rooms.write().await.get_mut(room) {
            Some(record) => {
                record.members.insert(username.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn remove_member(&self, room: &str, username: &str) -> bool {
        self.rooms
            .write()
            .await
            .get_mut(room)
            .is_some_and(|record| record.members.remove(username))
    }

    pub async fn delete_room(&self, room: &str) -> bool {
        self.rooms.write().await.remove(room).is_some()
    }

    pub async fn creator(&self, room: &str) -> Option<String> {
        self.rooms.read().await.get(room).map(|r| r.creator.clone())
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn is_member(&self, room: &str, username: &str) -> Result<bool, HubError> {
        Ok(self
            .rooms
            .read()
            .await
            .get(room)
            .is_some_and(|r| r.members.contains(username)))
    }

    async fn room_kind(&self, room: &str) -> Result<Option<RoomKind>, HubError> {
        Ok(self.rooms.read().await.get(room).map(|r| r.kind))
    }

    async fn member_usernames(&self, room: &str) -> Result<Vec<String>, HubError> {
        Ok(self
            .rooms
            .read()
            .await
            .get(room)
            .map(|r| r.members.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// Mock room directories for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Directory whose every call fails.
    #[derive(Debug, Default)]
    pub struct FailingRoomDirectory {
        call_count: AtomicUsize,
    }

    impl FailingRoomDirectory {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        fn fail<T>(&self) -> Result<T, HubError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Err(HubError::Directory("mock room directory error".to_string()))
        }
    }

    #[async_trait]
    impl RoomDirectory for FailingRoomDirectory {
        async fn is_member(&self, _room: &str, _username: &str) -> Result<bool, HubError> {
            self.fail()
        }

        async fn room_kind(&self, _room: &str) -> Result<Option<RoomKind>, HubError> {
            self.fail()
        }

        async fn member_usernames(&self, _room: &str) -> Result<Vec<String>, HubError> {
            self.fail()
        }
    }
}
