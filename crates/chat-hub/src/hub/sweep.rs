//! Store sweeps run by the background tasks.

use super::Hub;
use crate::errors::HubError;
use crate::protocol::{Envelope, EnvelopeBody, MessageKind};

use chrono::{DateTime, Utc};
use tracing::debug;

impl Hub {
    /// Fan out every scheduled message due at `now` as a `message`.
    ///
    /// Returns how many messages were released.
    pub async fn deliver_due_scheduled(&self, now: DateTime<Utc>) -> Result<usize, HubError> {
        let due = self.collaborators.messages.take_due_scheduled(now).await?;

        for message in &due {
            let envelope = Envelope::new(
                MessageKind::Message,
                message.sender.as_str(),
                Some(message.room.clone()),
                now,
                EnvelopeBody::Content(message.content_body()),
            );
            match self.fan_out(&message.room, &envelope, None).await {
                Ok(_) => self.push_offline(message),
                Err(reason) => debug!(
                    target: "hub.task.scheduled_delivery",
                    reason = reason.as_str(),
                    "Scheduled message not delivered"
                ),
            }
        }

        Ok(due.len())
    }

    /// Purge expired messages and fan out a `delete` for each.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, HubError> {
        let purged = self.collaborators.messages.purge_expired(now).await?;

        for message in &purged {
            let envelope = Envelope::new(
                MessageKind::Delete,
                message.sender.as_str(),
                Some(message.room.clone()),
                now,
                EnvelopeBody::Delete {
                    message_id: message.id.clone(),
                },
            );
            if let Err(reason) = self.fan_out(&message.room, &envelope, None).await {
                debug!(
                    target: "hub.task.expiry_sweep",
                    reason = reason.as_str(),
                    "Expiry notice not delivered"
                );
            }
        }

        Ok(purged.len())
    }
}
