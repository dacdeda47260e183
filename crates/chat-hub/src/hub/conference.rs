//! Conference operations shared by hub frames and the REST surface.
//!
//! Whichever surface triggers a transition, the same notifications go out:
//!
//! | Transition | Envelope | Recipients |
//! |------------|----------|------------|
//! | join | `conference_join` | other participants |
//! | join | `conference_peers` | the joiner |
//! | leave, or implicit leave on create/join elsewhere | `conference_leave` | remaining participants |

use super::{FanOut, Hub};
use crate::conference::{ConferenceInfo, Departure, PublicConferenceInfo};
use crate::errors::{DropReason, HubError};
use crate::protocol::{Envelope, EnvelopeBody, MessageKind};

use common::types::ConferenceId;
use tracing::info;

impl Hub {
    /// Create a conference with `creator` as sole participant.
    ///
    /// With a `room`, the creator must be allowed to address it.
    pub async fn create_conference(
        &self,
        creator: &str,
        room: Option<String>,
    ) -> Result<ConferenceInfo, HubError> {
        if let Some(room) = &room {
            self.require_room_access(room, creator).await?;
        }

        let outcome = self.conferences.create(creator, room).await?;
        if let Some(departure) = &outcome.departed {
            self.notify_departure(departure);
        }
        Ok(outcome.conference)
    }

    pub async fn join_conference(
        &self,
        conference_id: ConferenceId,
        username: &str,
    ) -> Result<ConferenceInfo, HubError> {
        self.join_conference_notified(conference_id, username)
            .await
            .map(|(info, _)| info)
    }

    /// Leave whatever conference `username` occupies. `None` if none.
    pub async fn leave_conference(&self, username: &str) -> Result<Option<Departure>, HubError> {
        self.leave_conference_notified(username)
            .await
            .map(|(departure, _)| departure)
    }

    pub async fn conference_info(
        &self,
        conference_id: ConferenceId,
    ) -> Result<ConferenceInfo, HubError> {
        self.conferences
            .info(conference_id)
            .await?
            .ok_or(HubError::ConferenceNotFound)
    }

    /// Participant count and capacity only.
    pub async fn public_conference_info(
        &self,
        conference_id: ConferenceId,
    ) -> Result<PublicConferenceInfo, HubError> {
        self.conference_info(conference_id)
            .await
            .map(|info| info.public())
    }

    /// Active conference attached to `room`, for a caller allowed to see it.
    pub async fn conference_for_room(
        &self,
        room: &str,
        username: &str,
    ) -> Result<ConferenceInfo, HubError> {
        self.require_room_access(room, username).await?;
        self.conferences
            .by_room(room)
            .await?
            .ok_or(HubError::ConferenceNotFound)
    }

    pub(super) async fn join_conference_notified(
        &self,
        conference_id: ConferenceId,
        username: &str,
    ) -> Result<(ConferenceInfo, FanOut), HubError> {
        let outcome = self.conferences.join(conference_id, username).await?;
        let mut fan_out = FanOut::default();

        if let Some(departure) = &outcome.departed {
            fan_out.merge(self.notify_departure(departure));
        }
        if outcome.already_joined {
            return Ok((outcome.conference, fan_out));
        }

        let info = &outcome.conference;
        let peers = info.peers_of(username);

        let joined = Envelope::conference(
            MessageKind::ConferenceJoin,
            username,
            EnvelopeBody::ConferenceMember {
                conference_id,
                username: username.to_string(),
            },
        );
        for peer in &peers {
            fan_out.record(self.send(peer, &joined));
        }

        let roster = Envelope::conference(
            MessageKind::ConferencePeers,
            username,
            EnvelopeBody::ConferencePeers {
                conference_id,
                peers,
            },
        );
        fan_out.record(self.send(username, &roster));

        info!(
            target: "hub.conference",
            conference_id = %conference_id,
            username = %username,
            participants = info.participants.len(),
            "Participant joined conference"
        );
        Ok((outcome.conference, fan_out))
    }

    pub(super) async fn leave_conference_notified(
        &self,
        username: &str,
    ) -> Result<(Option<Departure>, FanOut), HubError> {
        let departure = self.conferences.leave(username).await?;
        let fan_out = departure
            .as_ref()
            .map(|d| self.notify_departure(d))
            .unwrap_or_default();
        Ok((departure, fan_out))
    }

    fn notify_departure(&self, departure: &Departure) -> FanOut {
        info!(
            target: "hub.conference",
            conference_id = %departure.conference_id,
            username = %departure.username,
            remaining = departure.remaining.len(),
            dissolved = departure.dissolved,
            "Participant left conference"
        );

        let envelope = Envelope::conference(
            MessageKind::ConferenceLeave,
            &departure.username,
            EnvelopeBody::ConferenceMember {
                conference_id: departure.conference_id,
                username: departure.username.clone(),
            },
        );

        let mut fan_out = FanOut::default();
        for peer in &departure.remaining {
            fan_out.record(self.send(peer, &envelope));
        }
        fan_out
    }

    async fn require_room_access(&self, room: &str, username: &str) -> Result<(), HubError> {
        match self.authorize(room, username).await {
            Ok(()) => Ok(()),
            Err(DropReason::CollaboratorFailure) => {
                Err(HubError::Directory("room lookup failed".to_string()))
            }
            Err(_) => Err(HubError::Forbidden(
                "Not a member of this room".to_string(),
            )),
        }
    }
}
