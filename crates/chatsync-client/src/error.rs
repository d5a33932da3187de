use thiserror::Error;

use chatsync_net::NetError;

use crate::events::SessionState;

/// Errors returned by [`crate::SyncSession`] operations.
///
/// Transport loss is not an error here; it arrives as
/// [`crate::SessionEvent::ConnectionLost`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Invalid websocket URL: {0}")]
    InvalidUrl(#[source] NetError),

    #[error("Session cannot start from state {0}")]
    AlreadyStarted(SessionState),

    #[error("Failed to fetch history page {page}: {source}")]
    PaginationFetchFailed {
        page: u32,
        #[source]
        source: NetError,
    },

    #[error("Upload failed: {0}")]
    Upload(#[source] NetError),

    #[error("No upload endpoint configured")]
    UploadUnavailable,

    #[error("Session state lock poisoned")]
    LockPoisoned,
}
