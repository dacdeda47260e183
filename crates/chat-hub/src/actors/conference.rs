//! `ConferenceManagerActor` - singleton owner of every conference roster.
//!
//! The roster and its reverse index live inside the actor, so every
//! transition is processed one at a time. A user's disconnect racing a REST
//! `leave` for the same user is resolved by mailbox order: whichever arrives
//! second finds nothing to remove.

use super::messages::ConferenceMessage;
use super::metrics::{ActorType, HubMetrics, MailboxMonitor};
use crate::conference::{ConferenceInfo, ConferenceRoster, CreateOutcome, Departure, JoinOutcome};
use crate::errors::HubError;
use crate::observability::metrics as prom;

use chrono::Utc;
use common::types::ConferenceId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Channel buffer size for the conference manager mailbox.
const CONFERENCE_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `ConferenceManagerActor`.
#[derive(Clone, Debug)]
pub struct ConferenceManagerHandle {
    sender: mpsc::Sender<ConferenceMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl ConferenceManagerHandle {
    /// Spawn the actor and return a handle to it.
    #[must_use]
    pub fn spawn(
        cancel_token: CancellationToken,
        metrics: Arc<HubMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CONFERENCE_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Conference,
            "conference-manager",
        ));

        let actor = ConferenceManagerActor {
            receiver,
            cancel_token: cancel_token.clone(),
            roster: ConferenceRoster::new(),
            metrics,
            mailbox: Arc::clone(&mailbox),
        };
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender,
                cancel_token,
                mailbox,
            },
            task,
        )
    }

    /// Create a conference with `creator` as its only participant.
    pub async fn create(
        &self,
        creator: &str,
        room: Option<String>,
    ) -> Result<CreateOutcome, HubError> {
        let creator = creator.to_string();
        self.request(|respond_to| ConferenceMessage::Create {
            creator,
            room,
            now: Utc::now(),
            respond_to,
        })
        .await
    }

    /// Join a conference. `NotFound` and `Full` map to their `HubError` variants.
    pub async fn join(
        &self,
        conference_id: ConferenceId,
        username: &str,
    ) -> Result<JoinOutcome, HubError> {
        let username = username.to_string();
        let result = self
            .request(|respond_to| ConferenceMessage::Join {
                conference_id,
                username,
                respond_to,
            })
            .await?;
        result.map_err(HubError::from)
    }

    pub async fn leave(&self, username: &str) -> Result<Option<Departure>, HubError> {
        let username = username.to_string();
        self.request(|respond_to| ConferenceMessage::Leave {
            username,
            respond_to,
        })
        .await
    }

    pub async fn info(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Option<ConferenceInfo>, HubError> {
        self.request(|respond_to| ConferenceMessage::GetInfo {
            conference_id,
            respond_to,
        })
        .await
    }

    pub async fn by_room(&self, room: &str) -> Result<Option<ConferenceInfo>, HubError> {
        let room = room.to_string();
        self.request(|respond_to| ConferenceMessage::GetByRoom { room, respond_to })
            .await
    }

    pub async fn conference_of(&self, username: &str) -> Result<Option<ConferenceInfo>, HubError> {
        let username = username.to_string();
        self.request(|respond_to| ConferenceMessage::ConferenceOf {
            username,
            respond_to,
        })
        .await
    }

    /// Cancel the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ConferenceMessage,
    ) -> Result<T, HubError> {
        if self.cancel_token.is_cancelled() {
            return Err(HubError::ShuttingDown);
        }

        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| HubError::Internal(format!("channel send failed: {e}")))?;
        self.mailbox.record_enqueue();

        rx.await
            .map_err(|e| HubError::Internal(format!("response receive failed: {e}")))
    }
}

/// The `ConferenceManagerActor` implementation.
struct ConferenceManagerActor {
    receiver: mpsc::Receiver<ConferenceMessage>,
    cancel_token: CancellationToken,
    roster: ConferenceRoster,
    metrics: Arc<HubMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl ConferenceManagerActor {
    #[instrument(skip_all, name = "hub.actor.conference")]
    async fn run(mut self) {
        info!(target: "hub.conference", "ConferenceManagerActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "hub.conference",
                        "ConferenceManagerActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        break;
                    };
                    self.mailbox.record_dequeue();
                    prom::set_mailbox_depth(
                        ActorType::Conference.as_str(),
                        self.mailbox.current_depth(),
                    );
                    self.handle_message(message);
                }
            }
        }

        info!(
            target: "hub.conference",
            conferences_remaining = self.roster.len(),
            messages_processed = self.mailbox.messages_processed(),
            "ConferenceManagerActor stopped"
        );
    }

    fn handle_message(&mut self, message: ConferenceMessage) {
        match message {
            ConferenceMessage::Create {
                creator,
                room,
                now,
                respond_to,
            } => {
                let outcome = self.roster.create(&creator, room, now);
                info!(
                    target: "hub.conference",
                    conference_id = %outcome.conference.conference_id,
                    creator = %creator,
                    left_previous = outcome.departed.is_some(),
                    "Conference created"
                );
                self.publish_count();
                let _ = respond_to.send(outcome);
            }

            ConferenceMessage::Join {
                conference_id,
                username,
                respond_to,
            } => {
                let result = self.roster.join(conference_id, &username);
                match &result {
                    Ok(outcome) => debug!(
                        target: "hub.conference",
                        conference_id = %conference_id,
                        username = %username,
                        participants = outcome.conference.participants.len(),
                        already_joined = outcome.already_joined,
                        "Conference joined"
                    ),
                    Err(e) => debug!(
                        target: "hub.conference",
                        conference_id = %conference_id,
                        username = %username,
                        error = %e,
                        "Conference join rejected"
                    ),
                }
                self.publish_count();
                let _ = respond_to.send(result);
            }

            ConferenceMessage::Leave {
                username,
                respond_to,
            } => {
                let departure = self.roster.leave(&username);
                if let Some(departure) = &departure {
                    debug!(
                        target: "hub.conference",
                        conference_id = %departure.conference_id,
                        username = %username,
                        dissolved = departure.dissolved,
                        "Conference left"
                    );
                }
                self.publish_count();
                let _ = respond_to.send(departure);
            }

            ConferenceMessage::GetInfo {
                conference_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.roster.info(conference_id));
            }

            ConferenceMessage::GetByRoom { room, respond_to } => {
                let _ = respond_to.send(self.roster.by_room(&room));
            }

            ConferenceMessage::ConferenceOf {
                username,
                respond_to,
            } => {
                let _ = respond_to.send(self.roster.conference_of(&username));
            }
        }
    }

    fn publish_count(&self) {
        self.metrics.set_conferences(self.roster.len());
    }
}
