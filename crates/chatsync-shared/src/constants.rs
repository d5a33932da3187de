/// Application name
pub const APP_NAME: &str = "chatsync";

/// Default number of messages requested per history page
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Default typing debounce window in milliseconds
pub const TYPING_DEBOUNCE_MS: u64 = 1000;

/// Maximum attachment size in bytes (50 MiB)
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Capacity of the connection command and event channels
pub const CHANNEL_CAPACITY: usize = 256;

/// Header carrying the upload token
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Default chat server HTTP base URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Default room name
pub const DEFAULT_ROOM: &str = "lobby";
