//! What the session reports to the render layer.

use std::fmt;

use chatsync_net::CloseReason;
use chatsync_shared::{Message, MessageId};

/// Session lifecycle: `Idle -> Connecting -> Active -> Closed`.
///
/// Any state may move to `Closed`. A closed session is not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Normalized notifications, delivered in the order the underlying frames
/// and fetches were applied to the room state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A live message was appended. `from_self` is set for messages posted
    /// under the local username, which should not raise a notification.
    MessageAppended { message: Message, from_self: bool },
    /// Older messages were inserted at the front, oldest first.
    HistoryPrepended { page: u32, messages: Vec<Message> },
    /// No older pages remain.
    HistoryExhausted,
    /// Someone is typing. Transient; nothing is stored.
    Typing { username: Option<String> },
    /// A new reader was recorded for a message.
    ReadReceipt {
        message_id: MessageId,
        username: String,
    },
    /// Online list after a join or leave.
    PresenceChanged { online: Vec<String> },
    /// The transport closed without `stop()` being called.
    ConnectionLost { reason: CloseReason },
}

/// A message together with its known readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub message: Message,
    pub read_by: Vec<String>,
}

/// Point-in-time copy of everything the session knows about the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub state: SessionState,
    /// Oldest first.
    pub messages: Vec<MessageView>,
    pub online: Vec<String>,
    pub page: u32,
    pub history_exhausted: bool,
}
