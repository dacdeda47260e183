//! Scheduled delivery background task.
//!
//! Periodically asks the message store for scheduled messages whose time
//! has come and fans each out to its room as an ordinary `message`. The
//! store hands every due message out once, so a message is never released
//! twice even if a sweep overlaps a slow fan-out.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is cancelled. A sweep already
//! in progress completes first.

use crate::hub::Hub;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Start the scheduled delivery background task.
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "hub.task.scheduled_delivery")]
pub async fn start_scheduled_delivery(
    hub: Hub,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "hub.task.scheduled_delivery",
        interval_ms = interval.as_millis() as u64,
        "Starting scheduled delivery task"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match hub.deliver_due_scheduled(Utc::now()).await {
                    Ok(0) => {}
                    Ok(released) => {
                        debug!(
                            target: "hub.task.scheduled_delivery",
                            released,
                            "Released scheduled messages"
                        );
                    }
                    Err(e) => {
                        // Store may recover before the next tick
                        error!(
                            target: "hub.task.scheduled_delivery",
                            error = %e,
                            "Failed to release scheduled messages"
                        );
                    }
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "hub.task.scheduled_delivery",
                    "Scheduled delivery task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "hub.task.scheduled_delivery", "Scheduled delivery task stopped");
}
