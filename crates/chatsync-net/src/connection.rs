//! Room websocket lifecycle.
//!
//! The socket is driven by a dedicated tokio task. The owner sends it
//! commands through a [`ConnectionManager`] and receives
//! [`ConnectionEvent`]s on a channel, keeping socket I/O off the caller's
//! path entirely.

use std::fmt;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, info, trace, warn};

use chatsync_shared::constants::CHANNEL_CAPACITY;
use chatsync_shared::ClientFrame;

/// Close code reported when the peer's close frame carried no status.
const NO_STATUS_CODE: u16 = 1005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Why the connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called, or the owner went away.
    Local,
    /// The server sent a close frame.
    Remote { code: u16, reason: String },
    /// The stream ended without a close frame.
    EndOfStream,
    /// The websocket handshake failed.
    Handshake(String),
    /// Read or write failure on an open socket.
    Transport(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "closed locally"),
            Self::Remote { code, reason } if reason.is_empty() => {
                write!(f, "closed by server ({code})")
            }
            Self::Remote { code, reason } => write!(f, "closed by server ({code}: {reason})"),
            Self::EndOfStream => write!(f, "stream ended"),
            Self::Handshake(e) => write!(f, "handshake failed: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// Notifications sent *from* the connection task to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket is open; frames can be sent.
    Opened,
    /// A text frame arrived. Delivered in transport order.
    Frame(String),
    /// The connection is gone. Always the last event.
    Closed(CloseReason),
}

/// Commands sent *into* the connection task.
#[derive(Debug)]
enum ConnectionCommand {
    Send(String),
    Close,
}

/// Handle to one websocket connection.
///
/// Each manager owns exactly one underlying connection. There is no
/// reconnect: once [`ConnectionState::Closed`] is reached the manager is
/// spent.
pub struct ConnectionManager {
    cmd_tx: mpsc::Sender<ConnectionCommand>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionManager {
    /// Start connecting to `url` in the background.
    ///
    /// The manager is returned immediately in [`ConnectionState::Connecting`];
    /// [`ConnectionEvent::Opened`] follows once the handshake completes. A
    /// failed handshake produces [`ConnectionEvent::Closed`] instead.
    pub fn connect(url: &str) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let url = url.to_owned();

        tokio::spawn(async move {
            info!(url = %url, "Connecting to room websocket");

            let handshake = tokio::select! {
                result = connect_async(url.as_str()) => result,
                // Sends are refused while connecting, so any command here is
                // a close request (or the manager was dropped).
                _ = cmd_rx.recv() => {
                    debug!(url = %url, "Connection closed before handshake completed");
                    finish(&state_tx, &event_tx, CloseReason::Local).await;
                    return;
                }
            };

            match handshake {
                Ok((ws, _response)) => run_connection(ws, cmd_rx, event_tx, state_tx).await,
                Err(e) => {
                    warn!(url = %url, error = %e, "Websocket handshake failed");
                    finish(&state_tx, &event_tx, CloseReason::Handshake(e.to_string())).await;
                }
            }
        });

        (Self { cmd_tx, state_rx }, event_rx)
    }

    /// Drive an already-established websocket stream.
    ///
    /// The manager starts out [`ConnectionState::Open`] and still emits
    /// [`ConnectionEvent::Opened`] first.
    pub fn from_stream<S>(ws: WebSocketStream<S>) -> (Self, mpsc::Receiver<ConnectionEvent>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);

        tokio::spawn(run_connection(ws, cmd_rx, event_tx, state_tx));

        (Self { cmd_tx, state_rx }, event_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Serialize and transmit `frame`.
    ///
    /// Frames are dropped, not queued, unless the connection is open.
    /// Returns whether the frame was handed to the socket task.
    pub async fn send(&self, frame: &ClientFrame) -> bool {
        let state = self.state();
        if state != ConnectionState::Open {
            debug!(kind = frame.kind(), state = ?state, "Dropping frame, connection not open");
            return false;
        }

        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = frame.kind(), error = %e, "Failed to encode frame");
                return false;
            }
        };

        if self.cmd_tx.send(ConnectionCommand::Send(text)).await.is_err() {
            debug!(kind = frame.kind(), "Connection task gone, dropping frame");
            return false;
        }
        trace!(kind = frame.kind(), "Frame queued for sending");
        true
    }

    /// Close the connection and wait until it is [`ConnectionState::Closed`].
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(ConnectionCommand::Close).await;
        self.wait_closed().await;
    }

    /// Resolve once the connection reaches [`ConnectionState::Closed`].
    pub async fn wait_closed(&self) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }
}

/// Socket event loop for an open connection.
async fn run_connection<S>(
    ws: WebSocketStream<S>,
    mut cmd_rx: mpsc::Receiver<ConnectionCommand>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    state_tx.send_replace(ConnectionState::Open);
    info!("Room websocket open");
    let _ = event_tx.send(ConnectionEvent::Opened).await;

    let (mut sink, mut stream) = ws.split();

    let reason = loop {
        tokio::select! {
            // --- Outgoing commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ConnectionCommand::Send(text)) => {
                        if let Err(e) = sink.send(WsMessage::text(text)).await {
                            break CloseReason::Transport(e.to_string());
                        }
                    }
                    Some(ConnectionCommand::Close) | None => {
                        if let Err(e) = sink.close().await {
                            debug!(error = %e, "Error while sending close frame");
                        }
                        break CloseReason::Local;
                    }
                }
            }

            // --- Incoming frames ---
            msg = stream.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let frame = ConnectionEvent::Frame(text.as_str().to_owned());
                        if event_tx.send(frame).await.is_err() {
                            debug!("Event receiver dropped, closing connection");
                            let _ = sink.close().await;
                            break CloseReason::Local;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let reason = match frame {
                            Some(frame) => CloseReason::Remote {
                                code: u16::from(frame.code),
                                reason: frame.reason.as_str().to_owned(),
                            },
                            None => CloseReason::Remote {
                                code: NO_STATUS_CODE,
                                reason: String::new(),
                            },
                        };
                        // Flush the queued close reply to finish the handshake.
                        if let Err(e) = sink.close().await {
                            debug!(error = %e, "Error while answering close frame");
                        }
                        break reason;
                    }
                    Some(Ok(other)) => {
                        trace!(len = other.len(), "Ignoring non-text websocket message");
                    }
                    Some(Err(e)) => break CloseReason::Transport(e.to_string()),
                    None => break CloseReason::EndOfStream,
                }
            }
        }
    };

    finish(&state_tx, &event_tx, reason).await;
}

async fn finish(
    state_tx: &watch::Sender<ConnectionState>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
    reason: CloseReason,
) {
    state_tx.send_replace(ConnectionState::Closed);
    info!(reason = %reason, "Room websocket closed");
    let _ = event_tx.send(ConnectionEvent::Closed(reason)).await;
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};

    use chatsync_shared::MessageId;

    use super::*;

    async fn pair() -> (
        ConnectionManager,
        mpsc::Receiver<ConnectionEvent>,
        WebSocketStream<DuplexStream>,
    ) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let (manager, events) = ConnectionManager::from_stream(client);
        (manager, events, server)
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (manager, mut events, mut server) = pair().await;
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));
        assert_eq!(manager.state(), ConnectionState::Open);

        let raw = r#"{"type":"typing","username":"bob"}"#;
        server.send(WsMessage::text(raw)).await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Frame(raw.to_string()))
        );

        let frame = ClientFrame::Read {
            message_id: MessageId(3),
        };
        assert!(manager.send(&frame).await);

        let Some(Ok(WsMessage::Text(text))) = server.next().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value, serde_json::json!({"type": "read", "message_id": 3}));
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (_manager, mut events, mut server) = pair().await;
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));

        for i in 0..20 {
            server.send(WsMessage::text(format!("frame-{i}"))).await.unwrap();
        }
        for i in 0..20 {
            assert_eq!(
                events.recv().await,
                Some(ConnectionEvent::Frame(format!("frame-{i}")))
            );
        }
    }

    #[tokio::test]
    async fn test_remote_close() {
        let (manager, mut events, mut server) = pair().await;
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));

        server
            .send(WsMessage::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            })))
            .await
            .unwrap();

        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Closed(CloseReason::Remote {
                code: 1000,
                reason: "bye".into(),
            }))
        );
        assert_eq!(manager.state(), ConnectionState::Closed);

        // The close handshake is answered, not cut short.
        let reply = tokio::time::timeout(std::time::Duration::from_secs(5), server.next())
            .await
            .unwrap();
        assert!(matches!(reply, Some(Ok(WsMessage::Close(_)))));

        let frame = ClientFrame::Typing {
            username: "alice".into(),
        };
        assert!(!manager.send(&frame).await);
    }

    #[tokio::test]
    async fn test_local_close() {
        let (manager, mut events, mut server) = pair().await;
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));

        manager.close().await;
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Closed(CloseReason::Local))
        );
        assert!(matches!(server.next().await, Some(Ok(WsMessage::Close(_)))));
    }

    #[tokio::test]
    async fn test_dropped_transport_closes() {
        let (manager, mut events, server) = pair().await;
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));

        drop(server);
        assert!(matches!(
            events.recv().await,
            Some(ConnectionEvent::Closed(_))
        ));
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_connect_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(WsMessage::text(r#"{"type":"presence","action":"join","username":"a"}"#))
                .await
                .unwrap();
            // Hold the socket open until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let url = format!("ws://{addr}/ws/chat/lobby/");
        let (manager, mut events) = ConnectionManager::connect(&url);
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));
        assert_eq!(manager.state(), ConnectionState::Open);
        assert!(matches!(events.recv().await, Some(ConnectionEvent::Frame(_))));

        manager.close().await;
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Closed(CloseReason::Local))
        );
    }

    #[tokio::test]
    async fn test_connect_refused_reports_handshake_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (manager, mut events) = ConnectionManager::connect(&format!("ws://{addr}/"));
        assert!(matches!(
            events.recv().await,
            Some(ConnectionEvent::Closed(CloseReason::Handshake(_)))
        ));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }
}
