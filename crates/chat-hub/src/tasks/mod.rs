//! Background tasks for the chat hub.
//!
//! # Tasks
//!
//! - `scheduled_delivery` - Releases due `scheduled` messages to their rooms
//! - `expiry_sweep` - Purges messages past their `expires_at` and announces the deletion

pub mod expiry_sweep;
pub mod scheduled_delivery;

pub use expiry_sweep::start_expiry_sweep;
pub use scheduled_delivery::start_scheduled_delivery;
