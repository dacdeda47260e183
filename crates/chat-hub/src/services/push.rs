//! Push notifications for room members without a live session.
//!
//! Delivery is best effort. The hub hands notifications off on a detached
//! task and never looks at the result.

use crate::errors::HubError;
use crate::protocol::MessageKind;
use async_trait::async_trait;
use tracing::debug;

/// Characters of message text carried in a notification preview.
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub recipient: String,
    pub sender: String,
    pub room: String,
    pub kind: MessageKind,
    /// Leading text of a plaintext message. Encrypted content has none.
    pub preview: Option<String>,
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(&self, notification: PushNotification) -> Result<(), HubError>;
}

/// Notifier that only logs. Used when no push backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPushNotifier;

#[async_trait]
impl PushNotifier for TracingPushNotifier {
    async fn notify(&self, notification: PushNotification) -> Result<(), HubError> {
        debug!(
            target: "hub.push",
            recipient = %notification.recipient,
            sender = %notification.sender,
            room = %notification.room,
            kind = notification.kind.as_str(),
            "Push notification skipped: no backend configured"
        );
        Ok(())
    }
}

/// Mock notifiers for testing.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification it is asked to send.
    #[derive(Debug, Default)]
    pub struct RecordingPushNotifier {
        sent: Mutex<Vec<PushNotification>>,
    }

    impl RecordingPushNotifier {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Notifications recorded so far.
        pub fn sent(&self) -> Vec<PushNotification> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        /// Recipients recorded so far, sorted.
        pub fn recipients(&self) -> Vec<String> {
            let mut recipients: Vec<String> =
                self.sent().into_iter().map(|n| n.recipient).collect();
            recipients.sort();
            recipients
        }
    }

    #[async_trait]
    impl PushNotifier for RecordingPushNotifier {
        async fn notify(&self, notification: PushNotification) -> Result<(), HubError> {
            self.sent
                .lock()
                .map_err(|_| HubError::Internal("notifier lock poisoned".to_string()))?
                .push(notification);
            Ok(())
        }
    }
}
