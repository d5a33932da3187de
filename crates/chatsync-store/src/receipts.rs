//! Read receipt tracking.
//!
//! Keeps, per message id, the set of usernames that have read it. Entries
//! are created lazily and never removed for the lifetime of the session.

use std::collections::{BTreeSet, HashMap};

use chatsync_shared::MessageId;
use tracing::trace;

/// Per-message reader sets.
#[derive(Debug, Clone, Default)]
pub struct ReadReceiptTracker {
    readers: HashMap<MessageId, BTreeSet<String>>,
}

impl ReadReceiptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `username` has read `message_id`.
    ///
    /// Returns `false` when the reader was already known, in which case
    /// nothing changes.
    pub fn record(&mut self, message_id: MessageId, username: &str) -> bool {
        let readers = self.readers.entry(message_id).or_default();
        if readers.contains(username) {
            return false;
        }
        readers.insert(username.to_owned());
        trace!(message_id = %message_id, user = %username, "Recorded read receipt");
        true
    }

    /// Readers of `message_id`, sorted. Empty if nobody has read it yet.
    pub fn readers_of(&self, message_id: MessageId) -> Vec<String> {
        self.readers
            .get(&message_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_read(&self, message_id: MessageId, username: &str) -> bool {
        self.readers
            .get(&message_id)
            .is_some_and(|set| set.contains(username))
    }

    /// Number of messages with at least one tracked entry.
    pub fn tracked_messages(&self) -> usize {
        self.readers.len()
    }
}
