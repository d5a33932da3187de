use crate::cursor::PaginationCursor;
use crate::messages::MessageStore;
use crate::presence::PresenceTracker;

/// Everything the client knows about one room.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    pub messages: MessageStore,
    pub presence: PresenceTracker,
    pub cursor: PaginationCursor,
}

impl RoomState {
    /// Empty room whose history cursor starts after `initial_page`.
    pub fn new(initial_page: u32) -> Self {
        Self {
            messages: MessageStore::new(),
            presence: PresenceTracker::new(),
            cursor: PaginationCursor::new(initial_page),
        }
    }
}
