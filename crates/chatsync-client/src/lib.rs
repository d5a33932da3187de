pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod session;
pub mod typing;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use dispatcher::EventDispatcher;
pub use error::SessionError;
pub use events::{MessageView, RoomSnapshot, SessionEvent, SessionState};
pub use session::{PageLoad, SyncSession};
pub use typing::TypingThrottle;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Output goes to stderr so it does not interleave with the room.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("chatsync_client=debug,chatsync_net=debug,chatsync_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
