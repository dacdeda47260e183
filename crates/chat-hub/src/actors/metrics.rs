//! Actor mailbox monitoring and hub-wide counters.
//!
//! | Actor Type | Normal | Warning | Critical |
//! |------------|--------|---------|----------|
//! | Conference | < 100  | 100-500 | > 500    |
//! | Connection | < 64   | 64-192  | > 192    |
//!
//! Connection mailboxes are bounded by `HUB_OUTBOUND_BUFFER`; a full mailbox
//! drops the envelope for that recipient and is counted here.

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

pub const CONFERENCE_MAILBOX_NORMAL: usize = 100;
pub const CONFERENCE_MAILBOX_WARNING: usize = 500;

pub const CONNECTION_MAILBOX_NORMAL: usize = 64;
pub const CONNECTION_MAILBOX_WARNING: usize = 192;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// ConferenceManagerActor (singleton).
    Conference,
    /// ConnectionActor (one per live connection).
    Connection,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Conference => "conference",
            ActorType::Connection => "connection",
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Conference => CONFERENCE_MAILBOX_NORMAL,
            ActorType::Connection => CONNECTION_MAILBOX_NORMAL,
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Conference => CONFERENCE_MAILBOX_WARNING,
            ActorType::Connection => CONNECTION_MAILBOX_WARNING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks queue depth for one actor.
///
/// Enqueue is recorded by the handle that sends, dequeue by the actor, so
/// `current_depth` is the number of messages waiting.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);

        if self.level_for_depth(new_depth) == MailboxLevel::Critical {
            warn!(
                target: "hub.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = new_depth,
                threshold = self.actor_type.warning_threshold(),
                "Mailbox depth critical"
            );
        }
    }

    pub fn record_dequeue(&self) {
        // Never wraps below zero.
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(1)));
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message refused because the mailbox was full.
    pub fn record_drop(&self) {
        let dropped = self.messages_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            target: "hub.actor.mailbox",
            actor_type = self.actor_type.as_str(),
            actor_id = %self.actor_id,
            dropped = dropped,
            "Message dropped due to backpressure"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.actor_type.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Hub-wide counters, shared by the registry, the actors and the dispatcher.
///
/// Gauges are mirrored to Prometheus whenever they change.
#[derive(Debug, Default)]
pub struct HubMetrics {
    active_sessions: AtomicUsize,
    active_conferences: AtomicUsize,
    frames_dispatched: AtomicU64,
    frames_dropped: AtomicU64,
    deliveries: AtomicU64,
    skipped_deliveries: AtomicU64,
}

impl HubMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn session_opened(&self) {
        let count = self.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_sessions_active(count);
    }

    pub fn session_closed(&self) {
        let previous = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_sub(1)))
            .unwrap_or(0);
        prom::set_sessions_active(previous.saturating_sub(1));
    }

    pub fn set_conferences(&self, count: usize) {
        self.active_conferences.store(count, Ordering::Relaxed);
        prom::set_conferences_active(count);
    }

    pub fn record_dispatched(&self) {
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, delivered: bool) {
        if delivered {
            self.deliveries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.skipped_deliveries.fetch_add(1, Ordering::Relaxed);
        }
        prom::record_delivery(delivered);
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn conference_count(&self) -> usize {
        self.active_conferences.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn frames_dispatched(&self) -> u64 {
        self.frames_dispatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn skipped_deliveries(&self) -> u64 {
        self.skipped_deliveries.load(Ordering::Relaxed)
    }
}
