//! Conference roster state machine.
//!
//! Conferences are ephemeral multi-party call rosters, independent of rooms:
//!
//! ```text
//! create(creator) ──► Forming ──► Active (1..=10 participants) ──► Dissolved
//!                    (creator       join / leave                   (last leave,
//!                     joined)                                       entry removed)
//! ```
//!
//! [`ConferenceRoster`] holds the forward map (conference -> participants) and
//! the reverse index (user -> conference). Both are private and every
//! transition updates them together, so a user is in at most one conference
//! and the index never points at a roster that does not contain the user.
//!
//! The roster is plain synchronous data. Concurrency is provided by the
//! conference manager actor that owns it.

use chrono::{DateTime, Utc};
use common::types::ConferenceId;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Maximum participants in one conference.
pub const MAX_CONFERENCE_PARTICIPANTS: usize = 10;

/// Conference transition failures surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConferenceError {
    #[error("conference not found")]
    NotFound,

    #[error("conference is full ({capacity} participants)")]
    Full { capacity: usize },
}

#[derive(Debug, Clone)]
struct Conference {
    id: ConferenceId,
    creator: String,
    room: Option<String>,
    /// Join order is kept so peer lists are stable.
    participants: Vec<String>,
    created_at: DateTime<Utc>,
}

impl Conference {
    fn contains(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p == username)
    }

    fn info(&self) -> ConferenceInfo {
        ConferenceInfo {
            conference_id: self.id,
            creator: self.creator.clone(),
            room: self.room.clone(),
            participants: self.participants.clone(),
            capacity: MAX_CONFERENCE_PARTICIPANTS,
            created_at: self.created_at,
        }
    }
}

/// Full conference view including participant identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConferenceInfo {
    pub conference_id: ConferenceId,
    pub creator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub participants: Vec<String>,
    pub capacity: usize,
    pub created_at: DateTime<Utc>,
}

impl ConferenceInfo {
    #[must_use]
    pub fn public(&self) -> PublicConferenceInfo {
        PublicConferenceInfo {
            conference_id: self.conference_id,
            participant_count: self.participants.len(),
            capacity: self.capacity,
        }
    }

    /// Participants other than `username`, in join order.
    #[must_use]
    pub fn peers_of(&self, username: &str) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.as_str() != username)
            .cloned()
            .collect()
    }
}

/// Conference view without identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublicConferenceInfo {
    pub conference_id: ConferenceId,
    pub participant_count: usize,
    pub capacity: usize,
}

/// A user leaving a conference, whoever triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub conference_id: ConferenceId,
    pub username: String,
    /// Participants still present, in join order.
    pub remaining: Vec<String>,
    /// True when the departure emptied and deleted the conference.
    pub dissolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub conference: ConferenceInfo,
    /// Set when the creator had to leave another conference first.
    pub departed: Option<Departure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub conference: ConferenceInfo,
    /// The user was already a participant; nothing changed.
    pub already_joined: bool,
    /// Set when the user had to leave another conference first.
    pub departed: Option<Departure>,
}

/// Conference rosters plus the user -> conference reverse index.
#[derive(Debug, Default)]
pub struct ConferenceRoster {
    conferences: HashMap<ConferenceId, Conference>,
    by_user: HashMap<String, ConferenceId>,
}

impl ConferenceRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conference with `creator` as sole participant.
    ///
    /// A creator already in a conference leaves it first.
    pub fn create(
        &mut self,
        creator: &str,
        room: Option<String>,
        now: DateTime<Utc>,
    ) -> CreateOutcome {
        let departed = self.remove_participant(creator);

        let id = ConferenceId::new();
        let conference = Conference {
            id,
            creator: creator.to_string(),
            room,
            participants: vec![creator.to_string()],
            created_at: now,
        };
        let info = conference.info();

        self.conferences.insert(id, conference);
        self.by_user.insert(creator.to_string(), id);

        CreateOutcome {
            conference: info,
            departed,
        }
    }

    /// Add `username` to conference `id`.
    ///
    /// Idempotent for existing participants. A full or missing conference is
    /// rejected before anything changes, including the user's current
    /// conference membership.
    pub fn join(
        &mut self,
        id: ConferenceId,
        username: &str,
    ) -> Result<JoinOutcome, ConferenceError> {
        let conference = self.conferences.get(&id).ok_or(ConferenceError::NotFound)?;

        if conference.contains(username) {
            return Ok(JoinOutcome {
                conference: conference.info(),
                already_joined: true,
                departed: None,
            });
        }

        if conference.participants.len() >= MAX_CONFERENCE_PARTICIPANTS {
            return Err(ConferenceError::Full {
                capacity: MAX_CONFERENCE_PARTICIPANTS,
            });
        }

        // The user is not in `id`, so this never dissolves the target
        let departed = self.remove_participant(username);

        let conference = self
            .conferences
            .get_mut(&id)
            .ok_or(ConferenceError::NotFound)?;
        conference.participants.push(username.to_string());
        let info = conference.info();
        self.by_user.insert(username.to_string(), id);

        Ok(JoinOutcome {
            conference: info,
            already_joined: false,
            departed,
        })
    }

    /// Remove `username` from whatever conference they occupy.
    pub fn leave(&mut self, username: &str) -> Option<Departure> {
        self.remove_participant(username)
    }

    #[must_use]
    pub fn info(&self, id: ConferenceId) -> Option<ConferenceInfo> {
        self.conferences.get(&id).map(Conference::info)
    }

    /// Most recently created active conference attached to `room`.
    #[must_use]
    pub fn by_room(&self, room: &str) -> Option<ConferenceInfo> {
        self.conferences
            .values()
            .filter(|c| c.room.as_deref() == Some(room))
            .max_by_key(|c| (c.created_at, c.id))
            .map(Conference::info)
    }

    /// Conference currently occupied by `username`.
    #[must_use]
    pub fn conference_of(&self, username: &str) -> Option<ConferenceInfo> {
        self.by_user
            .get(username)
            .and_then(|id| self.conferences.get(id))
            .map(Conference::info)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conferences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conferences.is_empty()
    }

    /// The one place that removes a participant: roster and index change together.
    fn remove_participant(&mut self, username: &str) -> Option<Departure> {
        let conference_id = self.by_user.remove(username)?;

        let Some(conference) = self.conferences.get_mut(&conference_id) else {
            tracing::warn!(
                target: "hub.conference",
                conference_id = %conference_id,
                username = %username,
                "Reverse index pointed at a missing conference"
            );
            return None;
        };

        conference.participants.retain(|p| p != username);
        let remaining = conference.participants.clone();
        let dissolved = remaining.is_empty();
        if dissolved {
            self.conferences.remove(&conference_id);
        }

        Some(Departure {
            conference_id,
            username: username.to_string(),
            remaining,
            dissolved,
        })
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (user, id) in &self.by_user {
            let conference = self.conferences.get(id).unwrap();
            assert!(conference.contains(user), "{user} indexed but not in roster");
        }
        let mut seen = std::collections::HashSet::new();
        for conference in self.conferences.values() {
            assert!(!conference.participants.is_empty(), "empty conference kept");
            assert!(conference.participants.len() <= MAX_CONFERENCE_PARTICIPANTS);
            for user in &conference.participants {
                assert!(seen.insert(user.clone()), "{user} in two conferences");
                assert_eq!(self.by_user.get(user), Some(&conference.id));
            }
        }
    }
}
