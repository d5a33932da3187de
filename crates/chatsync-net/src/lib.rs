// Network layer: the room websocket plus the two REST endpoints the client
// talks to (history pages and attachment upload).

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod history;
pub mod upload;

pub use connection::{CloseReason, ConnectionEvent, ConnectionManager, ConnectionState};
pub use error::NetError;
pub use history::{HistorySource, HttpHistoryClient};
pub use upload::UploadClient;
