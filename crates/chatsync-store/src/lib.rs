//! # chatsync-store
//!
//! In-memory state of one chat room as seen by one client session.
//!
//! Nothing here performs I/O or locking. The owning session serializes all
//! access, so every type is a plain struct with `&mut self` mutators that
//! report whether they changed anything.

pub mod cursor;
pub mod messages;
pub mod presence;
pub mod receipts;
pub mod room;

pub use cursor::{FetchStart, PaginationCursor};
pub use messages::MessageStore;
pub use presence::PresenceTracker;
pub use receipts::ReadReceiptTracker;
pub use room::RoomState;
