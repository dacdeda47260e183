//! The hub: connection lifecycle, authorization and fan-out.
//!
//! The transport layer drives a [`Hub`] through four transitions:
//!
//! - [`Hub::connect`] on open, with the raw token and the write half
//! - [`Hub::dispatch`] for every inbound text frame
//! - [`Hub::disconnect`] on close (idempotent)
//! - [`Hub::transport_error`] when the connection breaks
//!
//! None of them hold a registry lock across a collaborator call. Room
//! membership is read through the [`RoomDirectory`] on every frame.
//!
//! Submodules add the per-type dispatch table, conference operations shared
//! with the REST surface, and the sweeps run by the background tasks.

mod conference;
mod dispatch;
mod sweep;

use crate::actors::{
    ConferenceManagerHandle, ConnectionActor, ConnectionExit, Delivery, HubMetrics,
};
use crate::auth::IdentityValidator;
use crate::config::Config;
use crate::errors::{DropReason, HubError};
use crate::observability::metrics as prom;
use crate::protocol::{Envelope, MessageKind};
use crate::registry::{Session, SessionRegistry};
use crate::repositories::{MessageStore, PresenceStore, RoomDirectory, RoomKind};
use crate::services::PushNotifier;
use crate::transport::{FrameSink, CLOSE_NORMAL, CLOSE_NOT_ACCEPTABLE, CLOSE_SESSION_REPLACED};

use chrono::Utc;
use common::types::ConnectionId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// External collaborators the hub consults.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityValidator>,
    pub rooms: Arc<dyn RoomDirectory>,
    pub messages: Arc<dyn MessageStore>,
    pub presence: Arc<dyn PresenceStore>,
    pub push: Arc<dyn PushNotifier>,
}

/// Frame and routing limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubLimits {
    /// Room every registered session receives, with no membership check.
    pub public_room: String,
    pub max_frame_bytes: usize,
    pub max_content_chars: usize,
    /// Per-connection outbound mailbox size.
    pub outbound_buffer: usize,
}

impl HubLimits {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            public_room: config.public_room.clone(),
            max_frame_bytes: config.max_frame_bytes,
            max_content_chars: config.max_content_chars,
            outbound_buffer: config.outbound_buffer,
        }
    }
}

impl Default for HubLimits {
    fn default() -> Self {
        Self {
            public_room: crate::config::DEFAULT_PUBLIC_ROOM.to_string(),
            max_frame_bytes: crate::config::DEFAULT_MAX_FRAME_BYTES,
            max_content_chars: crate::config::DEFAULT_MAX_CONTENT_CHARS,
            outbound_buffer: crate::config::DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// Per-recipient results of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub skipped: usize,
}

impl FanOut {
    #[must_use]
    pub fn single(delivery: Delivery) -> Self {
        let mut fan_out = Self::default();
        fan_out.record(delivery);
        fan_out
    }

    pub fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: FanOut) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
    }
}

/// Cheap to clone; every clone shares the same registries.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<SessionRegistry>,
    conferences: ConferenceManagerHandle,
    collaborators: Collaborators,
    limits: Arc<HubLimits>,
    metrics: Arc<HubMetrics>,
    cancel_token: CancellationToken,
}

impl Hub {
    /// Build a hub and spawn its conference manager under `cancel_token`.
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        limits: HubLimits,
        metrics: Arc<HubMetrics>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (conferences, _task) =
            ConferenceManagerHandle::spawn(cancel_token.child_token(), Arc::clone(&metrics));

        Self {
            registry: Arc::new(SessionRegistry::new()),
            conferences,
            collaborators,
            limits: Arc::new(limits),
            metrics,
            cancel_token,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn limits(&self) -> &HubLimits {
        &self.limits
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityValidator> {
        &self.collaborators.identity
    }

    /// Close every connection and stop the conference manager.
    pub fn shutdown(&self) {
        info!(
            target: "hub.registry",
            sessions = self.registry.len(),
            "Hub shutting down"
        );
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Validate `token` and register the connection behind `sink`.
    ///
    /// On rejection the sink is closed with 4406 and nothing is registered.
    /// A user who already has a session keeps only the new one; the old
    /// connection is closed with 4409.
    #[instrument(skip_all, name = "hub.connect")]
    pub async fn connect(
        &self,
        token: Option<&str>,
        mut sink: Box<dyn FrameSink>,
    ) -> Result<Session, HubError> {
        if self.is_shutting_down() {
            let _ = sink.close(CLOSE_NORMAL, "shutting down").await;
            return Err(HubError::ShuttingDown);
        }

        let identity = match token.filter(|t| !t.is_empty()) {
            Some(token) => self.collaborators.identity.validate(token).await,
            None => Err(HubError::InvalidToken("Missing token".to_string())),
        };
        let identity = match identity {
            Ok(identity) => identity,
            Err(e) => {
                debug!(target: "hub.registry", error = %e, "Connection rejected");
                prom::record_connection_rejected();
                let _ = sink.close(CLOSE_NOT_ACCEPTABLE, "not acceptable").await;
                return Err(e);
            }
        };

        let connection_id = ConnectionId::new();
        let (handle, task) = ConnectionActor::spawn(
            connection_id,
            &identity.username,
            sink,
            self.limits.outbound_buffer,
            self.cancel_token.child_token(),
        );
        let session = Session::new(identity.username, handle);

        let replaced = self.registry.register(session.clone());
        self.supervise(connection_id, task);

        let now = Utc::now();
        if let Err(e) = self
            .collaborators
            .presence
            .set_online(&session.username, true, now)
            .await
        {
            warn!(target: "hub.registry", error = %e, "Presence update failed");
        }

        match replaced {
            Some(previous) => {
                info!(
                    target: "hub.registry",
                    username = %session.username,
                    connection_id = %connection_id,
                    replaced = %previous.connection_id,
                    "Session replaced by a new connection"
                );
                previous
                    .handle
                    .close(CLOSE_SESSION_REPLACED, "session replaced");
            }
            None => {
                self.metrics.session_opened();
                info!(
                    target: "hub.registry",
                    username = %session.username,
                    connection_id = %connection_id,
                    "Session registered"
                );
                let join = Envelope::presence(
                    MessageKind::Join,
                    &session.username,
                    &self.limits.public_room,
                );
                let public_room = self.limits.public_room.clone();
                if let Err(reason) = self.fan_out(&public_room, &join, None).await {
                    debug!(
                        target: "hub.registry",
                        reason = reason.as_str(),
                        "Join broadcast dropped"
                    );
                }
            }
        }

        Ok(session)
    }

    /// Tear down the session owned by `connection_id`.
    ///
    /// A connection that was already removed or replaced is a no-op. If the
    /// user reconnects while the teardown is in flight, the remaining steps
    /// are skipped so the new session keeps its presence and conference.
    #[instrument(skip_all, name = "hub.disconnect", fields(connection_id = %connection_id))]
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let Some(session) = self.registry.deregister(connection_id) else {
            debug!(target: "hub.registry", "Disconnect for inactive connection ignored");
            return;
        };

        session.handle.cancel();
        self.metrics.session_closed();
        info!(
            target: "hub.registry",
            username = %session.username,
            connection_id = %connection_id,
            "Session deregistered"
        );

        if let Err(e) = self
            .collaborators
            .presence
            .set_online(&session.username, false, Utc::now())
            .await
        {
            warn!(target: "hub.registry", error = %e, "Presence update failed");
        }

        if self.reconnected(&session.username) {
            // The new connection's online write may have landed first.
            if let Err(e) = self
                .collaborators
                .presence
                .set_online(&session.username, true, Utc::now())
                .await
            {
                warn!(target: "hub.registry", error = %e, "Presence update failed");
            }
            return;
        }

        let leave = Envelope::presence(
            MessageKind::Leave,
            &session.username,
            &self.limits.public_room,
        );
        let public_room = self.limits.public_room.clone();
        if let Err(reason) = self.fan_out(&public_room, &leave, None).await {
            debug!(target: "hub.registry", reason = reason.as_str(), "Leave broadcast dropped");
        }

        if self.reconnected(&session.username) {
            return;
        }
        if let Err(e) = self.leave_conference(&session.username).await {
            warn!(target: "hub.conference", error = %e, "Conference cleanup failed");
        }
    }

    fn reconnected(&self, username: &str) -> bool {
        let back = self.registry.is_online(username);
        if back {
            debug!(
                target: "hub.registry",
                username = %username,
                "User reconnected during disconnect, leaving new session intact"
            );
        }
        back
    }

    /// Log a broken connection and clean it up like a disconnect.
    pub async fn transport_error(&self, connection_id: ConnectionId, cause: &str) {
        warn!(
            target: "hub.connection",
            connection_id = %connection_id,
            cause = %cause,
            "Transport error, closing connection"
        );
        prom::record_transport_error();
        self.disconnect(connection_id).await;
    }

    /// Serialize `envelope` and hand it to one user.
    pub fn send(&self, username: &str, envelope: &Envelope) -> Delivery {
        match envelope.to_frame() {
            Ok(frame) => self.send_frame(username, &frame),
            Err(e) => {
                warn!(target: "hub.dispatch", error = %e, "Envelope serialization failed");
                Delivery::Skipped
            }
        }
    }

    fn send_frame(&self, username: &str, frame: &Arc<str>) -> Delivery {
        let delivery = self.registry.send(username, frame);
        self.metrics
            .record_delivery(delivery == Delivery::Delivered);
        delivery
    }

    /// Deliver `envelope` to every reachable recipient of `room`.
    ///
    /// One recipient's failure never stops delivery to the rest.
    pub async fn fan_out(
        &self,
        room: &str,
        envelope: &Envelope,
        exclude: Option<&str>,
    ) -> Result<FanOut, DropReason> {
        let frame = envelope.to_frame().map_err(|e| {
            warn!(target: "hub.dispatch", error = %e, "Envelope serialization failed");
            DropReason::Invalid
        })?;

        let mut fan_out = FanOut::default();
        for recipient in self.recipients(room).await? {
            if exclude == Some(recipient.as_str()) {
                continue;
            }
            fan_out.record(self.send_frame(&recipient, &frame));
        }
        Ok(fan_out)
    }

    /// Registered sessions that may receive frames for `room`.
    async fn recipients(&self, room: &str) -> Result<Vec<String>, DropReason> {
        if room == self.limits.public_room {
            return Ok(self.registry.usernames());
        }

        match self.room_kind(room).await? {
            Some(RoomKind::General) => Ok(self.registry.usernames()),
            Some(_) => {
                let members = self
                    .collaborators
                    .rooms
                    .member_usernames(room)
                    .await
                    .map_err(collaborator_failure)?;
                Ok(members
                    .into_iter()
                    .filter(|m| self.registry.is_online(m))
                    .collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Check that `username` may address `room`.
    ///
    /// The public room and general rooms are open to every session. An
    /// unknown room counts as a membership failure.
    async fn authorize(&self, room: &str, username: &str) -> Result<(), DropReason> {
        if room == self.limits.public_room {
            return Ok(());
        }

        match self.room_kind(room).await? {
            Some(RoomKind::General) => Ok(()),
            Some(_) => {
                let member = self
                    .collaborators
                    .rooms
                    .is_member(room, username)
                    .await
                    .map_err(collaborator_failure)?;
                if member {
                    Ok(())
                } else {
                    Err(DropReason::NotMember)
                }
            }
            None => Err(DropReason::NotMember),
        }
    }

    async fn room_kind(&self, room: &str) -> Result<Option<RoomKind>, DropReason> {
        self.collaborators
            .rooms
            .room_kind(room)
            .await
            .map_err(collaborator_failure)
    }

    /// Turn a dead connection actor into a disconnect.
    fn supervise(
        &self,
        connection_id: ConnectionId,
        task: tokio::task::JoinHandle<ConnectionExit>,
    ) {
        let hub = self.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(ConnectionExit::TransportFailed(cause)) => {
                    hub.transport_error(connection_id, &cause).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        target: "hub.connection",
                        connection_id = %connection_id,
                        error = %e,
                        "Connection actor task failed"
                    );
                    hub.disconnect(connection_id).await;
                }
            }
        });
    }
}

fn collaborator_failure(err: HubError) -> DropReason {
    warn!(target: "hub.dispatch", error = %err, "Collaborator call failed");
    DropReason::CollaboratorFailure
}
