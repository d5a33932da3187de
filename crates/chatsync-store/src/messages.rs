//! Ordered message storage with id-based deduplication.
//!
//! Live messages are appended at the tail and history pages are prepended
//! at the head. Ascending id order holds because the server assigns ids in
//! send order, pages only contribute ids older than the head, and uploads
//! are inserted at their id position.

use std::collections::{HashMap, HashSet, VecDeque};

use chatsync_shared::{HistoryMessage, Message, MessageId};
use tracing::{debug, trace};

use crate::receipts::ReadReceiptTracker;

/// The room's messages in display order, plus who has read each one.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    order: VecDeque<MessageId>,
    by_id: HashMap<MessageId, Message>,
    receipts: ReadReceiptTracker,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a live message at the tail.
    ///
    /// Returns `false` and leaves the store untouched when a message with
    /// the same id is already present.
    pub fn append(&mut self, message: Message) -> bool {
        if self.by_id.contains_key(&message.id) {
            trace!(id = %message.id, "Skipping duplicate message");
            return false;
        }
        self.order.push_back(message.id);
        self.by_id.insert(message.id, message);
        true
    }

    /// Insert an older page in front of the current head.
    ///
    /// The page keeps its own order. Only entries older than the current
    /// head are inserted: stored ids and repeats inside the page are
    /// skipped, and so are unseen ids newer than the head, which are still
    /// on their way over the live stream. Overlapping or retried pages are
    /// therefore harmless. Each entry's `read_by` list is merged into the
    /// receipts either way.
    ///
    /// Returns the messages that were actually inserted, oldest first.
    pub fn prepend_page<I>(&mut self, page: I) -> Vec<Message>
    where
        I: IntoIterator<Item = HistoryMessage>,
    {
        let head = self.oldest();
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();

        for entry in page {
            let id = entry.message.id;
            for reader in &entry.read_by {
                self.receipts.record(id, reader);
            }
            if head.is_some_and(|head| id >= head) {
                trace!(id = %id, "Skipping page entry not older than head");
                continue;
            }
            if self.by_id.contains_key(&id) || !seen.insert(id) {
                continue;
            }
            fresh.push(entry.message);
        }

        for message in fresh.iter().rev() {
            self.order.push_front(message.id);
            self.by_id.insert(message.id, message.clone());
        }

        debug!(inserted = fresh.len(), total = self.order.len(), "Prepended history page");
        fresh
    }

    /// Insert a message at the position its id dictates.
    ///
    /// Used for messages obtained outside the live stream, which may be
    /// older than the current tail. Returns `false` for a known id.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.by_id.contains_key(&message.id) {
            trace!(id = %message.id, "Skipping duplicate message");
            return false;
        }
        let pos = self.order.partition_point(|id| *id < message.id);
        self.order.insert(pos, message.id);
        self.by_id.insert(message.id, message);
        true
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Messages in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<MessageId> {
        self.order.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Id of the oldest loaded message.
    pub fn oldest(&self) -> Option<MessageId> {
        self.order.front().copied()
    }

    /// Id of the newest loaded message.
    pub fn newest(&self) -> Option<MessageId> {
        self.order.back().copied()
    }

    /// Record a read receipt. The message does not have to be loaded.
    pub fn record_read(&mut self, message_id: MessageId, username: &str) -> bool {
        self.receipts.record(message_id, username)
    }

    pub fn readers_of(&self, message_id: MessageId) -> Vec<String> {
        self.receipts.readers_of(message_id)
    }

    pub fn receipts(&self) -> &ReadReceiptTracker {
        &self.receipts
    }
}
