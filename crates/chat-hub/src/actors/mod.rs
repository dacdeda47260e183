//! Actor model for the chat hub.
//!
//! ```text
//! Hub (root CancellationToken)
//! ├── ConferenceManagerActor (singleton, owns every conference roster)
//! └── ConnectionActor (one per registered session, owns the write half)
//! ```
//!
//! - **Per-recipient ordering**: each connection drains one FIFO mailbox
//! - **Non-blocking fan-out**: senders use `try_send`; a full mailbox skips that recipient
//! - **CancellationToken propagation**: actors hold child tokens of the hub's root token
//!
//! # Modules
//!
//! - [`connection`] - `ConnectionActor` per live connection
//! - [`conference`] - `ConferenceManagerActor` and its handle
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and hub counters

pub mod conference;
pub mod connection;
pub mod messages;
pub mod metrics;

pub use conference::ConferenceManagerHandle;
pub use connection::{ConnectionActor, ConnectionActorHandle, ConnectionExit, Delivery};
pub use messages::{ConferenceMessage, ConnectionMessage};
pub use metrics::{ActorType, HubMetrics, MailboxLevel, MailboxMonitor};
