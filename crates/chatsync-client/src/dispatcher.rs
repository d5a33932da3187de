//! Inbound frame routing.
//!
//! Decodes one raw websocket frame, applies it to the [`RoomState`] and
//! yields the notification, if any, the render layer should see.

use tracing::{debug, trace};

use chatsync_shared::{FrameError, PresenceAction, ServerFrame};
use chatsync_store::RoomState;

use crate::events::SessionEvent;

#[derive(Debug, Clone)]
pub struct EventDispatcher {
    local_username: String,
}

impl EventDispatcher {
    pub fn new(local_username: impl Into<String>) -> Self {
        Self {
            local_username: local_username.into(),
        }
    }

    /// Decode and apply `raw`.
    ///
    /// Malformed frames are returned as errors and leave `room` untouched.
    /// Unknown frame kinds and frames that change nothing produce `None`.
    pub fn handle(
        &self,
        raw: &str,
        room: &mut RoomState,
    ) -> Result<Option<SessionEvent>, FrameError> {
        let frame = ServerFrame::decode(raw)?;
        Ok(self.apply(frame, room))
    }

    pub fn apply(&self, frame: ServerFrame, room: &mut RoomState) -> Option<SessionEvent> {
        match frame {
            ServerFrame::Message(message) => {
                if !room.messages.append(message.clone()) {
                    trace!(msg_id = %message.id, "Duplicate message ignored");
                    return None;
                }
                let from_self = message.username == self.local_username;
                Some(SessionEvent::MessageAppended { message, from_self })
            }

            ServerFrame::Typing(typing) => Some(SessionEvent::Typing {
                username: typing.username,
            }),

            ServerFrame::Read(read) => {
                if !room.messages.record_read(read.message_id, &read.username) {
                    return None;
                }
                Some(SessionEvent::ReadReceipt {
                    message_id: read.message_id,
                    username: read.username,
                })
            }

            ServerFrame::Presence(presence) => {
                let changed = match presence.action {
                    PresenceAction::Join => room.presence.join(&presence.username),
                    PresenceAction::Leave => room.presence.leave(&presence.username),
                };
                changed.then(|| SessionEvent::PresenceChanged {
                    online: room.presence.snapshot(),
                })
            }

            ServerFrame::Unknown(kind) => {
                debug!(kind = %kind, "Ignoring unknown frame type");
                None
            }
        }
    }
}
