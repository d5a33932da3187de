use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FrameError;
use crate::types::MessageId;

/// A chat message as broadcast by the server.
///
/// `content` and `username` are carried exactly as received; escaping is
/// the render layer's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned id, unique within the room
    pub id: MessageId,
    pub username: String,
    /// Send time. Timestamps without an offset are taken as UTC.
    #[serde(deserialize_with = "utc_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Message text (empty when the message only carries an attachment)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Link to the uploaded attachment, if any
    #[serde(default)]
    pub attachment_url: Option<String>,
}

/// One entry of a history page: a message plus who has already read it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryMessage {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default)]
    pub read_by: Vec<String>,
}

impl From<Message> for HistoryMessage {
    fn from(message: Message) -> Self {
        Self {
            message,
            read_by: Vec::new(),
        }
    }
}

/// Response body of `GET /api/messages/{room}/`.
///
/// Messages are ordered oldest-first within the page; page 1 is the most
/// recent batch. An empty `messages` list means history is exhausted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub num_pages: Option<u32>,
}

impl HistoryPage {
    /// Whether the server reported `requested` as its last page.
    ///
    /// The server clamps out-of-range page numbers to the last page, so
    /// this is the only way to stop before fetching the same page twice.
    pub fn is_last_page(&self, requested: u32) -> bool {
        self.num_pages.is_some_and(|total| requested >= total)
    }
}

/// Typing notification. Carries no state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingFrame {
    #[serde(default)]
    pub username: Option<String>,
}

/// Read receipt: `username` has read `message_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadFrame {
    pub message_id: MessageId,
    pub username: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Join,
    Leave,
}

/// A user joined or left the room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceFrame {
    pub action: PresenceAction,
    pub username: String,
}

/// All frames the server pushes over the room websocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Message(Message),
    Typing(TypingFrame),
    Read(ReadFrame),
    Presence(PresenceFrame),
    /// A frame kind this client does not know. Ignored by receivers.
    Unknown(String),
}

impl ServerFrame {
    /// Decode a raw text frame.
    ///
    /// The `type` field selects the payload shape. Unrecognized kinds decode
    /// to [`ServerFrame::Unknown`] instead of failing.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(raw).map_err(FrameError::InvalidJson)?;

        let kind = value
            .as_object()
            .ok_or(FrameError::NotAnObject)?
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingType)?
            .to_owned();

        match kind.as_str() {
            "message" => decode_payload("message", value).map(Self::Message),
            "typing" => decode_payload("typing", value).map(Self::Typing),
            "read" => decode_payload("read", value).map(Self::Read),
            "presence" => decode_payload("presence", value).map(Self::Presence),
            _ => Ok(Self::Unknown(kind)),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::Typing(_) => "typing",
            Self::Read(_) => "read",
            Self::Presence(_) => "presence",
            Self::Unknown(kind) => kind,
        }
    }
}

/// Frames this client sends to the server.
///
/// Ids and timestamps are assigned server side; the reader of a `read`
/// frame is taken from the authenticated connection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Message { message: String, username: String },
    Typing { username: String },
    Read { message_id: MessageId },
}

impl ClientFrame {
    /// Serialize to the JSON text sent over the websocket
    pub fn encode(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Encode)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Typing { .. } => "typing",
            Self::Read { .. } => "read",
        }
    }
}

fn decode_payload<T: DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, FrameError> {
    serde_json::from_value(value).map_err(|source| FrameError::InvalidPayload { kind, source })
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept RFC 3339 timestamps, or naive ISO 8601 ones as emitted by a
/// server running without time zone support.
fn utc_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(timestamp) = raw.parse::<DateTime<FixedOffset>>() {
        return Ok(timestamp.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message_frame() {
        let raw = r#"{"type":"message","id":12,"username":"alice",
            "content":"hi <b>there</b>","attachment_url":null,
            "timestamp":"2024-03-01T10:15:00.123456+00:00"}"#;

        let ServerFrame::Message(msg) = ServerFrame::decode(raw).unwrap() else {
            panic!("expected a message frame");
        };
        assert_eq!(msg.id, MessageId(12));
        assert_eq!(msg.username, "alice");
        assert_eq!(msg.content, "hi <b>there</b>");
        assert_eq!(msg.attachment_url, None);
        assert_eq!(msg.timestamp.to_rfc3339(), "2024-03-01T10:15:00.123456+00:00");
    }

    #[test]
    fn test_decode_message_without_content() {
        let raw = r#"{"type":"message","id":3,"username":"bob",
            "timestamp":"2024-03-01T10:15:00Z","attachment_url":"/media/attachments/a.png"}"#;

        let ServerFrame::Message(msg) = ServerFrame::decode(raw).unwrap() else {
            panic!("expected a message frame");
        };
        assert!(msg.content.is_empty());
        assert_eq!(msg.attachment_url.as_deref(), Some("/media/attachments/a.png"));

        let raw = r#"{"type":"message","id":4,"username":"bob","content":null,
            "timestamp":"2024-03-01T10:15:00Z"}"#;
        let ServerFrame::Message(msg) = ServerFrame::decode(raw).unwrap() else {
            panic!("expected a message frame");
        };
        assert!(msg.content.is_empty());
    }

    #[test]
    fn test_decode_naive_timestamp_as_utc() {
        let raw = r#"{"type":"message","id":5,"username":"bob","content":"hey",
            "timestamp":"2024-03-01T10:15:00.250000"}"#;
        let ServerFrame::Message(msg) = ServerFrame::decode(raw).unwrap() else {
            panic!("expected a message frame");
        };
        assert_eq!(msg.timestamp.to_rfc3339(), "2024-03-01T10:15:00.250+00:00");

        let page: HistoryPage = serde_json::from_str(
            r#"{"messages":[{"id":6,"username":"a","content":"x",
                "timestamp":"2024-03-01 09:00:00","read_by":["b"]}]}"#,
        )
        .unwrap();
        assert_eq!(
            page.messages[0].message.timestamp.to_rfc3339(),
            "2024-03-01T09:00:00+00:00"
        );

        let raw = r#"{"type":"message","id":7,"username":"bob","timestamp":"yesterday"}"#;
        assert!(matches!(
            ServerFrame::decode(raw),
            Err(FrameError::InvalidPayload { kind: "message", .. })
        ));
    }

    #[test]
    fn test_decode_message_missing_required_field() {
        let raw = r#"{"type":"message","username":"bob","timestamp":"2024-03-01T10:15:00Z"}"#;
        let err = ServerFrame::decode(raw).unwrap_err();
        assert!(matches!(err, FrameError::InvalidPayload { kind: "message", .. }));

        let raw = r#"{"type":"message","id":1,"username":"bob"}"#;
        assert!(ServerFrame::decode(raw).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ServerFrame::decode("not json"),
            Err(FrameError::InvalidJson(_))
        ));
        assert!(matches!(
            ServerFrame::decode("[1,2,3]"),
            Err(FrameError::NotAnObject)
        ));
        assert!(matches!(
            ServerFrame::decode(r#"{"username":"bob"}"#),
            Err(FrameError::MissingType)
        ));
        assert!(matches!(
            ServerFrame::decode(r#"{"type":5}"#),
            Err(FrameError::MissingType)
        ));
    }

    #[test]
    fn test_decode_unknown_type_is_not_an_error() {
        let frame = ServerFrame::decode(r#"{"type":"reaction","emoji":"+1"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Unknown("reaction".into()));
        assert_eq!(frame.kind(), "reaction");
    }

    #[test]
    fn test_decode_presence_and_read() {
        let frame =
            ServerFrame::decode(r#"{"type":"presence","action":"join","username":"alice"}"#)
                .unwrap();
        assert_eq!(
            frame,
            ServerFrame::Presence(PresenceFrame {
                action: PresenceAction::Join,
                username: "alice".into(),
            })
        );

        let bad = ServerFrame::decode(r#"{"type":"presence","action":"wave","username":"a"}"#);
        assert!(matches!(
            bad,
            Err(FrameError::InvalidPayload { kind: "presence", .. })
        ));

        let frame =
            ServerFrame::decode(r#"{"type":"read","message_id":9,"username":"carol"}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Read(ReadFrame {
                message_id: MessageId(9),
                username: "carol".into(),
            })
        );
        assert!(ServerFrame::decode(r#"{"type":"read","message_id":9}"#).is_err());
    }

    #[test]
    fn test_decode_typing_with_null_username() {
        let frame = ServerFrame::decode(r#"{"type":"typing","username":null}"#).unwrap();
        assert_eq!(frame, ServerFrame::Typing(TypingFrame { username: None }));
    }

    #[test]
    fn test_encode_client_frames() {
        let frame = ClientFrame::Message {
            message: "hello".into(),
            username: "alice".into(),
        };
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "message", "message": "hello", "username": "alice"})
        );

        let frame = ClientFrame::Read {
            message_id: MessageId(5),
        };
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"type": "read", "message_id": 5}));

        let frame = ClientFrame::Typing {
            username: "alice".into(),
        };
        assert_eq!(frame.kind(), "typing");
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"type": "typing", "username": "alice"}));
    }

    #[test]
    fn test_history_page_parses_read_by() {
        let raw = r#"{"messages":[
            {"id":8,"username":"a","timestamp":"2024-03-01T10:00:00Z","content":"x",
             "attachment_url":null,"read_by":["b","c"]},
            {"id":9,"username":"b","timestamp":"2024-03-01T10:01:00Z","content":"y",
             "attachment_url":null,"read_by":[]}
        ],"page":2,"num_pages":3}"#;

        let page: HistoryPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].message.id, MessageId(8));
        assert_eq!(page.messages[0].read_by, vec!["b", "c"]);
        assert!(!page.is_last_page(2));
        assert!(page.is_last_page(3));
    }

    #[test]
    fn test_history_page_without_metadata() {
        let page: HistoryPage = serde_json::from_str(r#"{"messages":[]}"#).unwrap();
        assert!(page.messages.is_empty());
        assert!(!page.is_last_page(100));

        let page: HistoryPage = serde_json::from_str("{}").unwrap();
        assert!(page.messages.is_empty());
    }
}
