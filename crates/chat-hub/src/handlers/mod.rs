//! HTTP request handlers for the chat hub.

pub mod conferences;
pub mod metrics;

pub use conferences::{
    conference_for_room, create_conference, get_conference, join_conference, leave_conference,
    public_conference,
};
pub use metrics::metrics_router;
