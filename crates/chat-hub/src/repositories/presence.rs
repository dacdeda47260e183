//! Presence store: online flag and last-seen time per user.

use crate::errors::HubError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceRecord {
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}

#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn set_online(
        &self,
        username: &str,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), HubError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPresenceStore {
    records: DashMap<String, PresenceRecord>,
}

impl InMemoryPresenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<PresenceRecord> {
        self.records.get(username).map(|r| *r)
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn set_online(
        &self,
        username: &str,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), HubError> {
        self.records.insert(
            username.to_string(),
            PresenceRecord {
                online,
                last_seen: at,
            },
        );
        Ok(())
    }
}

/// Mock presence stores for testing.
pub mod mock {
    use super::*;
    use tokio::sync::{Notify, Semaphore};

    /// Store that holds every offline write until [`release`](Self::release).
    #[derive(Debug)]
    pub struct GatedPresenceStore {
        inner: InMemoryPresenceStore,
        gate: Semaphore,
        held: Notify,
    }

    impl Default for GatedPresenceStore {
        fn default() -> Self {
            Self {
                inner: InMemoryPresenceStore::new(),
                gate: Semaphore::new(0),
                held: Notify::new(),
            }
        }
    }

    impl GatedPresenceStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn get(&self, username: &str) -> Option<PresenceRecord> {
            self.inner.get(username)
        }

        /// Resolves once an offline write is waiting at the gate.
        pub async fn offline_write_held(&self) {
            self.held.notified().await;
        }

        /// Let one held offline write through.
        pub fn release(&self) {
            self.gate.add_permits(1);
        }
    }

    #[async_trait]
    impl PresenceStore for GatedPresenceStore {
        async fn set_online(
            &self,
            username: &str,
            online: bool,
            at: DateTime<Utc>,
        ) -> Result<(), HubError> {
            if !online {
                self.held.notify_one();
                let permit = self
                    .gate
                    .acquire()
                    .await
                    .map_err(|e| HubError::Store(e.to_string()))?;
                permit.forget();
            }
            self.inner.set_online(username, online, at).await
        }
    }
}
