//! Outbound services the hub calls but does not wait on.
//!
//! - `push` - best-effort notifications to offline room members

pub mod push;

pub use push::{PushNotification, PushNotifier, TracingPushNotifier};
