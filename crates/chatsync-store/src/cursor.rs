//! History pagination cursor.

use tracing::debug;

/// Result of asking the cursor for permission to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStart {
    /// Fetch this page number.
    Ready(u32),
    /// History is exhausted; do not fetch.
    Exhausted,
    /// Another fetch is outstanding.
    InFlight,
}

/// Tracks which history page comes next and whether one is being fetched.
///
/// The page number only moves forward, by exactly one per non-empty page.
/// Exhaustion is terminal.
#[derive(Debug, Clone)]
pub struct PaginationCursor {
    page: u32,
    exhausted: bool,
    in_flight: Option<u32>,
}

impl PaginationCursor {
    /// `initial_page` is the last page already shown; the first fetch asks
    /// for the one after it.
    pub fn new(initial_page: u32) -> Self {
        Self {
            page: initial_page,
            exhausted: false,
            in_flight: None,
        }
    }

    /// Last page merged into the store.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Claim the fetch slot for the next page.
    pub fn begin_fetch(&mut self) -> FetchStart {
        if self.exhausted {
            return FetchStart::Exhausted;
        }
        if self.in_flight.is_some() {
            return FetchStart::InFlight;
        }
        let next = self.page.saturating_add(1);
        self.in_flight = Some(next);
        FetchStart::Ready(next)
    }

    /// The outstanding fetch returned messages. Advances the cursor onto
    /// that page; `last_page` additionally marks history as exhausted.
    pub fn finish_page(&mut self, last_page: bool) {
        if let Some(page) = self.in_flight.take() {
            self.page = page;
            self.exhausted = last_page;
            debug!(page, exhausted = last_page, "History cursor advanced");
        }
    }

    /// The outstanding fetch returned nothing: history is exhausted.
    pub fn finish_exhausted(&mut self) {
        if self.in_flight.take().is_some() {
            self.exhausted = true;
            debug!(page = self.page, "History exhausted");
        }
    }

    /// The outstanding fetch failed or was dropped. The cursor is left
    /// where it was so the same page can be retried.
    pub fn abort_fetch(&mut self) {
        self.in_flight = None;
    }
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self::new(0)
    }
}
