//! Prometheus metric definitions for the chat hub.
//!
//! All metrics follow Prometheus naming conventions:
//! - `hub_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `message_type`: bounded by `MessageKind` (24 values)
//! - `reason`: bounded by `DropReason` (10 values)
//! - `outcome`: `delivered` or `skipped`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle for `/metrics`.
///
/// Must be called before any metric is recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Dispatch is in-memory plus at most one store call (p99 < 50ms)
        .set_buckets_for_metric(
            Matcher::Prefix("hub_dispatch".to_string()),
            &[
                0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set dispatch latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Metric: `hub_sessions_active`
pub fn set_sessions_active(count: usize) {
    // usize to f64 is exact for realistic session counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("hub_sessions_active").set(count as f64);
}

/// Metric: `hub_conferences_active`
pub fn set_conferences_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("hub_conferences_active").set(count as f64);
}

/// Metric: `hub_frames_total`, labels: `message_type`, `message_class`
pub fn record_frame(message_type: &'static str, message_class: &'static str) {
    counter!(
        "hub_frames_total",
        "message_type" => message_type,
        "message_class" => message_class
    )
    .increment(1);
}

/// Metric: `hub_frames_dropped_total`, labels: `reason`
pub fn record_frame_dropped(reason: &'static str) {
    counter!("hub_frames_dropped_total", "reason" => reason).increment(1);
}

/// Metric: `hub_deliveries_total`, labels: `outcome`
pub fn record_delivery(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "skipped" };
    counter!("hub_deliveries_total", "outcome" => outcome).increment(1);
}

/// Metric: `hub_dispatch_latency_seconds`, labels: `message_type`
pub fn record_dispatch_latency(message_type: &'static str, duration: Duration) {
    histogram!("hub_dispatch_latency_seconds", "message_type" => message_type)
        .record(duration.as_secs_f64());
}

/// Metric: `hub_actor_mailbox_depth`, labels: `actor_type`
pub fn set_mailbox_depth(actor_type: &'static str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("hub_actor_mailbox_depth", "actor_type" => actor_type).set(depth as f64);
}

/// Metric: `hub_connections_rejected_total`
pub fn record_connection_rejected() {
    counter!("hub_connections_rejected_total").increment(1);
}

/// Metric: `hub_transport_errors_total`
pub fn record_transport_error() {
    counter!("hub_transport_errors_total").increment(1);
}
