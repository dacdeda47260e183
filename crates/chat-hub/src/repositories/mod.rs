//! Collaborators the hub reads from and writes through.
//!
//! Each is an `async-trait` seam with an in-memory implementation used by the
//! binary and the tests. Persistence schemas live outside the hub.

pub mod messages;
pub mod presence;
pub mod rooms;

pub use messages::{InMemoryMessageStore, MessageStore, NewMessage, StoredMessage};
pub use presence::{InMemoryPresenceStore, PresenceRecord, PresenceStore};
pub use rooms::{InMemoryRoomDirectory, RoomDirectory, RoomKind};
