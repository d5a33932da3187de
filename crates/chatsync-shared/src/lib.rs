//! # chatsync-shared
//!
//! Wire protocol shared by every chatsync crate: the JSON frames exchanged
//! over the room websocket, the history page shape returned by the REST
//! API, and the constants both sides agree on.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::FrameError;
pub use protocol::{
    ClientFrame, HistoryMessage, HistoryPage, Message, PresenceAction, PresenceFrame, ReadFrame,
    ServerFrame, TypingFrame,
};
pub use types::MessageId;
