use thiserror::Error;

/// Reasons an inbound frame is rejected as malformed.
///
/// A rejected frame is dropped by the receiver; none of these is fatal.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Malformed frame: invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Malformed frame: expected a JSON object")]
    NotAnObject,

    #[error("Malformed frame: missing or non-string `type` field")]
    MissingType,

    #[error("Malformed `{kind}` frame: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}
