//! Observability for the chat hub: health probes and Prometheus metrics.
//!
//! # Privacy by Default
//!
//! Async entry points use `#[instrument(skip_all)]` and log usernames, room
//! ids and message kinds only. Frame payloads and message text are never
//! logged.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `hub_sessions_active` | Gauge | none | Registered sessions |
//! | `hub_conferences_active` | Gauge | none | Live conferences |
//! | `hub_frames_total` | Counter | `message_type` | Frames dispatched |
//! | `hub_frames_dropped_total` | Counter | `reason` | Frames discarded |
//! | `hub_deliveries_total` | Counter | `outcome` | Per-recipient fan-out results |
//! | `hub_dispatch_latency_seconds` | Histogram | `message_type` | Receipt to fan-out done |
//! | `hub_actor_mailbox_depth` | Gauge | `actor_type` | Conference manager queue depth |
//! | `hub_connections_rejected_total` | Counter | none | Failed identity validation |
//! | `hub_transport_errors_total` | Counter | none | Forced teardowns |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
