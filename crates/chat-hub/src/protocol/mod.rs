//! Wire protocol for the persistent client connection.
//!
//! - [`MessageKind`]: closed set of frame types and their routing class
//! - [`ClientFrame`]: what clients may send, parsed and shape-validated
//! - [`Envelope`]: what the hub sends, with hub-assigned sender and timestamp

pub mod envelope;
pub mod inbound;
pub mod kind;

pub use envelope::{ContentBody, Envelope, EnvelopeBody};
pub use inbound::{parse_frame, truncate_chars, ClientFrame, FileRef};
pub use kind::{MessageClass, MessageKind};
