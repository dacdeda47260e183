//! Session registry: who is connected, and through which connection.
//!
//! Two coupled maps:
//!
//! - `by_username`: username -> current [`Session`]
//! - `by_connection`: connection id -> username, for every *current* session
//!
//! A user has at most one entry in `by_username`. Registering a second
//! connection replaces the first and hands the evicted session back to the
//! caller. The evicted connection id is dropped from `by_connection` in the
//! same critical section, so its later close finds nothing to tear down.
//!
//! Lock order is always `by_username` then `by_connection`.

use crate::actors::{ConnectionActorHandle, Delivery};
use chrono::{DateTime, Utc};
use common::types::ConnectionId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// One live, authenticated connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    /// Set once from the validated identity, never changed.
    pub username: String,
    pub connected_at: DateTime<Utc>,
    pub handle: ConnectionActorHandle,
}

impl Session {
    #[must_use]
    pub fn new(username: String, handle: ConnectionActorHandle) -> Self {
        Self {
            connection_id: handle.connection_id(),
            username,
            connected_at: Utc::now(),
            handle,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_username: DashMap<String, Session>,
    by_connection: DashMap<ConnectionId, String>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` as the user's only session.
    ///
    /// Returns the session it replaced, if any. The caller is responsible
    /// for closing it.
    pub fn register(&self, session: Session) -> Option<Session> {
        let connection_id = session.connection_id;
        let username = session.username.clone();

        match self.by_username.entry(username.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(session);
                self.by_connection.remove(&previous.connection_id);
                self.by_connection.insert(connection_id, username);
                debug!(
                    target: "hub.registry",
                    username = %previous.username,
                    evicted = %previous.connection_id,
                    connection_id = %connection_id,
                    "Session replaced"
                );
                Some(previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(session);
                self.by_connection.insert(connection_id, username);
                None
            }
        }
    }

    /// Remove the session owned by `connection_id`.
    ///
    /// Returns it only if it was still the user's current session. A stale
    /// or unknown connection id is a no-op.
    pub fn deregister(&self, connection_id: ConnectionId) -> Option<Session> {
        let (_, username) = self.by_connection.remove(&connection_id)?;
        self.by_username
            .remove_if(&username, |_, session| session.connection_id == connection_id)
            .map(|(_, session)| session)
    }

    /// Hand `frame` to the user's connection, if they have one.
    pub fn send(&self, username: &str, frame: &Arc<str>) -> Delivery {
        // Clone the handle so the shard lock is released before the send
        let handle = match self.by_username.get(username) {
            Some(session) => session.handle.clone(),
            None => return Delivery::Skipped,
        };
        handle.deliver(Arc::clone(frame))
    }

    #[must_use]
    pub fn session(&self, username: &str) -> Option<Session> {
        self.by_username.get(username).map(|s| s.clone())
    }

    /// Current session for `connection_id`, if it has not been replaced.
    #[must_use]
    pub fn session_for_connection(&self, connection_id: ConnectionId) -> Option<Session> {
        let username = self.by_connection.get(&connection_id)?.clone();
        self.by_username
            .get(&username)
            .filter(|s| s.connection_id == connection_id)
            .map(|s| s.clone())
    }

    #[must_use]
    pub fn is_online(&self, username: &str) -> bool {
        self.by_username.contains_key(username)
    }

    /// Snapshot of every registered username.
    #[must_use]
    pub fn usernames(&self) -> Vec<String> {
        self.by_username.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_username.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty()
    }

    #[cfg(test)]
    fn connection_count(&self) -> usize {
        self.by_connection.len()
    }
}
