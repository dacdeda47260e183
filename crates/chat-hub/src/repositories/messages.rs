//! Message store: durable content messages.
//!
//! The hub persists content frames before fanning them out and re-reads the
//! original on edit/delete to check ownership. Scheduled and expiring
//! messages are drained from here by the background tasks.

use crate::errors::HubError;
use crate::protocol::{ContentBody, FileRef, MessageKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A content message about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub room: String,
    pub sender: String,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub file: Option<FileRef>,
    pub encrypted: Option<Value>,
    pub extra: Option<Map<String, Value>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A persisted content message.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub room: String,
    pub sender: String,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub file: Option<FileRef>,
    pub encrypted: Option<Value>,
    pub extra: Option<Map<String, Value>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Envelope fields for this message.
    #[must_use]
    pub fn content_body(&self) -> ContentBody {
        ContentBody {
            id: self.id.clone(),
            text: self.text.clone(),
            file: self.file.clone(),
            encrypted: self.encrypted.clone(),
            extra: self.extra.clone(),
            scheduled_at: self.scheduled_at,
            expires_at: self.expires_at,
        }
    }

    fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.kind == MessageKind::Scheduled && self.scheduled_at.is_some_and(|at| at <= now)
    }

    /// Unreleased scheduled messages never expire.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.kind != MessageKind::Scheduled && self.expires_at.is_some_and(|at| at <= now)
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist `message` and assign its id.
    async fn save(&self, message: NewMessage) -> Result<StoredMessage, HubError>;

    async fn find(&self, id: &str) -> Result<Option<StoredMessage>, HubError>;

    /// Replace the text of `id`. Fails with `NotFound` if it is gone.
    async fn update_text(&self, id: &str, text: &str) -> Result<(), HubError>;

    async fn delete(&self, id: &str) -> Result<(), HubError>;

    /// Scheduled messages due at `now`, each returned once.
    ///
    /// Returned messages are converted to ordinary `message` kind.
    async fn take_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<StoredMessage>, HubError>;

    /// Remove and return every released message whose `expires_at` has passed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<StoredMessage>, HubError>;
}

#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<HashMap<String, StoredMessage>>,
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Every message in `room`, oldest first.
    pub async fn in_room(&self, room: &str) -> Vec<StoredMessage> {
        let mut found: Vec<StoredMessage> = self
            .messages
            .read()
            .await
            .values()
            .filter(|m| m.room == room)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        found
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save(&self, message: NewMessage) -> Result<StoredMessage, HubError> {
        let stored = StoredMessage {
            id: Uuid::new_v4().to_string(),
            room: message.room,
            sender: message.sender,
            kind: message.kind,
            text: message.text,
            file: message.file,
            encrypted: message.encrypted,
            extra: message.extra,
            scheduled_at: message.scheduled_at,
            expires_at: message.expires_at,
            created_at: message.created_at,
        };
        self.messages
            .write()
            .await
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find(&self, id: &str) -> Result<Option<StoredMessage>, HubError> {
        Ok(self.messages.read().await.get(id).cloned())
    }

    async fn update_text(&self, id: &str, text: &str) -> Result<(), HubError> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| HubError::NotFound("Message not found".to_string()))?;
        message.text = Some(text.to_string());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), HubError> {
        self.messages.write().await.remove(id);
        Ok(())
    }

    async fn take_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<StoredMessage>, HubError> {
        let mut messages = self.messages.write().await;
        let mut due: Vec<StoredMessage> = messages
            .values_mut()
            .filter(|m| m.is_pending(now))
            .map(|m| {
                m.kind = MessageKind::Message;
                m.clone()
            })
            .collect();
        due.sort_by_key(|m| m.scheduled_at);
        Ok(due)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<StoredMessage>, HubError> {
        let mut messages = self.messages.write().await;
        let expired: Vec<String> = messages
            .values()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id.clone())
            .collect();

        let mut purged: Vec<StoredMessage> = expired
            .iter()
            .filter_map(|id| messages.remove(id))
            .collect();
        purged.sort_by_key(|m| m.expires_at);
        Ok(purged)
    }
}

/// Mock message stores for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose writes fail. Reads return nothing.
    #[derive(Debug, Default)]
    pub struct FailingMessageStore {
        call_count: AtomicUsize,
    }

    impl FailingMessageStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        fn fail<T>(&self) -> Result<T, HubError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Err(HubError::Store("mock message store error".to_string()))
        }
    }

    #[async_trait]
    impl MessageStore for FailingMessageStore {
        async fn save(&self, _message: NewMessage) -> Result<StoredMessage, HubError> {
            self.fail()
        }

        async fn find(&self, _id: &str) -> Result<Option<StoredMessage>, HubError> {
            self.fail()
        }

        async fn update_text(&self, _id: &str, _text: &str) -> Result<(), HubError> {
            self.fail()
        }

        async fn delete(&self, _id: &str) -> Result<(), HubError> {
            self.fail()
        }

        async fn take_due_scheduled(
            &self,
            _now: DateTime<Utc>,
        ) -> Result<Vec<StoredMessage>, HubError> {
            self.fail()
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<Vec<StoredMessage>, HubError> {
            self.fail()
        }
    }
}
