//! The room sync session.
//!
//! [`SyncSession`] owns the room state and wires the websocket connection,
//! the history source and the render-layer event channel together.
//!
//! All state lives behind one mutex that is never held across an `.await`.
//! Inbound frames are applied by a single pump task in arrival order;
//! history merges and user actions take the same lock for the duration of
//! a synchronous update, so every mutation is atomic with respect to the
//! others.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use chatsync_net::{
    ConnectionEvent, ConnectionManager, ConnectionState, HistorySource, HttpHistoryClient,
    UploadClient,
};
use chatsync_shared::constants::CHANNEL_CAPACITY;
use chatsync_shared::{ClientFrame, Message, MessageId};
use chatsync_store::{FetchStart, RoomState};

use crate::config::ClientConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::SessionError;
use crate::events::{MessageView, RoomSnapshot, SessionEvent, SessionState};
use crate::typing::TypingThrottle;

/// Outcome of [`SyncSession::load_older_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoad {
    /// `page` was fetched and `inserted` new messages were prepended.
    /// `exhausted` is set when the server reported it as the last page.
    Loaded {
        page: u32,
        inserted: usize,
        exhausted: bool,
    },
    /// No older history remains. Nothing was fetched.
    Exhausted,
    /// Another load was already in flight; this call did nothing.
    Coalesced,
}

struct SessionInner {
    state: SessionState,
    room: RoomState,
    dispatcher: EventDispatcher,
    typing: TypingThrottle,
    connection: Option<Arc<ConnectionManager>>,
}

pub struct SyncSession {
    config: ClientConfig,
    inner: Arc<Mutex<SessionInner>>,
    history: Arc<dyn HistorySource>,
    uploader: Option<UploadClient>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl SyncSession {
    /// Create an idle session reading history from `history`.
    ///
    /// The returned receiver yields [`SessionEvent`]s for the render layer.
    pub fn new(
        config: ClientConfig,
        history: Arc<dyn HistorySource>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let inner = SessionInner {
            state: SessionState::Idle,
            room: RoomState::new(config.initial_page),
            dispatcher: EventDispatcher::new(config.username.clone()),
            typing: TypingThrottle::new(config.typing_debounce),
            connection: None,
        };

        let session = Self {
            config,
            inner: Arc::new(Mutex::new(inner)),
            history,
            uploader: None,
            events_tx,
        };
        (session, events_rx)
    }

    /// Session talking to the HTTP endpoints named in `config`, with
    /// attachment uploads enabled.
    pub fn from_config(config: ClientConfig) -> (Self, mpsc::Receiver<SessionEvent>) {
        let history = Arc::new(HttpHistoryClient::new(&config.server_url, &config.room));
        let mut uploader = UploadClient::new(&config.server_url, &config.room);
        if let Some(ref token) = config.csrf_token {
            uploader = uploader.with_csrf_token(token.clone());
        }

        let (session, events) = Self::new(config, history);
        (session.with_uploader(uploader), events)
    }

    pub fn with_uploader(mut self, uploader: UploadClient) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionInner>, SessionError> {
        self.inner.lock().map_err(|_| SessionError::LockPoisoned)
    }

    async fn emit(&self, event: SessionEvent) {
        emit(&self.events_tx, event).await;
    }

    // --- Lifecycle ---

    /// Open the room websocket. Only valid from [`SessionState::Idle`].
    pub async fn start(&self) -> Result<(), SessionError> {
        let url = self
            .config
            .websocket_url()
            .map_err(SessionError::InvalidUrl)?;
        self.begin_connecting().await?;
        self.run(|| {
            info!(url = %url, room = %self.config.room, "Connecting to room");
            ConnectionManager::connect(&url)
        })
    }

    /// Drive an existing connection instead of dialing one. Only valid from
    /// [`SessionState::Idle`].
    pub async fn attach(
        &self,
        manager: ConnectionManager,
        events: mpsc::Receiver<ConnectionEvent>,
    ) -> Result<(), SessionError> {
        self.begin_connecting().await?;
        self.run(move || (manager, events))
    }

    /// Close the connection. The session ends in [`SessionState::Closed`]
    /// from any state and cannot be restarted.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let (connection, changed) = {
            let mut inner = self.lock()?;
            let changed = inner.state != SessionState::Closed;
            inner.state = SessionState::Closed;
            (inner.connection.clone(), changed)
        };

        if changed {
            info!(room = %self.config.room, "Session stopped");
            self.emit(SessionEvent::StateChanged(SessionState::Closed))
                .await;
        }
        if let Some(connection) = connection {
            connection.close().await;
        }
        Ok(())
    }

    async fn begin_connecting(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.lock()?;
            if inner.state != SessionState::Idle {
                return Err(SessionError::AlreadyStarted(inner.state));
            }
            inner.state = SessionState::Connecting;
        }
        self.emit(SessionEvent::StateChanged(SessionState::Connecting))
            .await;
        Ok(())
    }

    /// Install the connection produced by `connect` and spawn the pump.
    ///
    /// `stop()` may have run while `Connecting` was being emitted; in that
    /// case nothing is dialed and the session stays closed.
    fn run<F>(&self, connect: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> (ConnectionManager, mpsc::Receiver<ConnectionEvent>),
    {
        let events = {
            let mut inner = self.lock()?;
            if inner.state == SessionState::Closed {
                debug!("Session stopped before connecting");
                return Ok(());
            }
            let (manager, events) = connect();
            inner.connection = Some(Arc::new(manager));
            events
        };
        tokio::spawn(pump(
            Arc::clone(&self.inner),
            events,
            self.events_tx.clone(),
        ));
        Ok(())
    }

    // --- Outbound frames ---

    /// Send `frame` if connected. Returns whether it reached the socket
    /// task; frames are never queued while disconnected.
    async fn transmit(&self, frame: ClientFrame) -> Result<bool, SessionError> {
        let connection = self.lock()?.connection.clone();
        match connection {
            Some(connection) => Ok(connection.send(&frame).await),
            None => {
                debug!(kind = frame.kind(), "Not connected, dropping frame");
                Ok(false)
            }
        }
    }

    /// Post `text` to the room.
    ///
    /// The text is trimmed; an empty result is rejected without sending.
    /// Nothing is added locally: the message appears once the server
    /// broadcasts it back.
    pub async fn send_message(&self, text: &str) -> Result<bool, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.transmit(ClientFrame::Message {
            message: text.to_string(),
            username: self.config.username.clone(),
        })
        .await
    }

    /// Report a keystroke. Sends a `typing` frame only when the previous
    /// keystroke is older than the debounce window.
    ///
    /// Keystrokes made while the connection is not open are ignored and do
    /// not start a debounce window.
    pub async fn send_typing(&self) -> Result<bool, SessionError> {
        let should_send = {
            let mut inner = self.lock()?;
            let open = inner
                .connection
                .as_ref()
                .is_some_and(|connection| connection.state() == ConnectionState::Open);
            if !open {
                debug!("Not connected, ignoring keystroke");
                return Ok(false);
            }
            inner.typing.keystroke(Instant::now())
        };
        if !should_send {
            trace!("Typing frame suppressed");
            return Ok(false);
        }
        self.transmit(ClientFrame::Typing {
            username: self.config.username.clone(),
        })
        .await
    }

    pub async fn send_read_receipt(&self, message_id: MessageId) -> Result<bool, SessionError> {
        self.transmit(ClientFrame::Read { message_id }).await
    }

    /// Send a read receipt for every loaded message, oldest first.
    /// Returns how many were sent.
    pub async fn mark_visible_as_read(&self) -> Result<usize, SessionError> {
        let ids = self.lock()?.room.messages.ids();
        let mut sent = 0;
        for id in ids {
            if self.send_read_receipt(id).await? {
                sent += 1;
            }
        }
        debug!(sent, "Marked messages as read");
        Ok(sent)
    }

    // --- History ---

    /// Fetch the next older page and merge it in front of the store.
    ///
    /// At most one load runs at a time: an overlapping call returns
    /// [`PageLoad::Coalesced`] without fetching. A failed fetch leaves the
    /// cursor unchanged so the same page is retried next time.
    pub async fn load_older_page(&self) -> Result<PageLoad, SessionError> {
        let page = match self.lock()?.room.cursor.begin_fetch() {
            FetchStart::Ready(page) => page,
            FetchStart::Exhausted => {
                trace!("History exhausted, not fetching");
                return Ok(PageLoad::Exhausted);
            }
            FetchStart::InFlight => {
                debug!("History fetch already in flight");
                return Ok(PageLoad::Coalesced);
            }
        };

        let mut guard = FetchGuard::new(&self.inner);
        let result = self.history.fetch_page(page, self.config.per_page).await;

        let history = match result {
            Ok(history) => history,
            Err(e) => {
                drop(guard);
                warn!(page, error = %e, "History fetch failed");
                return Err(SessionError::PaginationFetchFailed { page, source: e });
            }
        };

        let (inserted, exhausted) = {
            let mut inner = self.lock()?;
            guard.disarm();
            if history.messages.is_empty() {
                inner.room.cursor.finish_exhausted();
                (None, true)
            } else {
                let last_page = history.is_last_page(page);
                let inserted = inner.room.messages.prepend_page(history.messages);
                inner.room.cursor.finish_page(last_page);
                (Some(inserted), last_page)
            }
        };

        let Some(inserted) = inserted else {
            info!(page, "No older history");
            self.emit(SessionEvent::HistoryExhausted).await;
            return Ok(PageLoad::Exhausted);
        };

        let count = inserted.len();
        info!(page, inserted = count, exhausted, "Loaded older history");
        self.emit(SessionEvent::HistoryPrepended {
            page,
            messages: inserted,
        })
        .await;
        if exhausted {
            self.emit(SessionEvent::HistoryExhausted).await;
        }

        Ok(PageLoad::Loaded {
            page,
            inserted: count,
            exhausted,
        })
    }

    // --- Attachments ---

    /// Upload the file at `path` with an optional caption.
    ///
    /// The message the server returns is inserted right away at its id
    /// position; the later websocket echo of the same id is dropped as a
    /// duplicate.
    pub async fn send_attachment(&self, path: &Path, text: &str) -> Result<Message, SessionError> {
        let uploader = self
            .uploader
            .as_ref()
            .ok_or(SessionError::UploadUnavailable)?;
        let message = uploader
            .upload_file(path, text)
            .await
            .map_err(SessionError::Upload)?;

        let inserted = self.lock()?.room.messages.insert(message.clone());
        if inserted {
            let from_self = message.username == self.config.username;
            self.emit(SessionEvent::MessageAppended {
                message: message.clone(),
                from_self,
            })
            .await;
        }
        Ok(message)
    }

    // --- Queries ---

    pub fn state(&self) -> Result<SessionState, SessionError> {
        Ok(self.lock()?.state)
    }

    pub fn online_users(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.lock()?.room.presence.snapshot())
    }

    pub fn readers_of(&self, message_id: MessageId) -> Result<Vec<String>, SessionError> {
        Ok(self.lock()?.room.messages.readers_of(message_id))
    }

    pub fn message_ids(&self) -> Result<Vec<MessageId>, SessionError> {
        Ok(self.lock()?.room.messages.ids())
    }

    pub fn snapshot(&self) -> Result<RoomSnapshot, SessionError> {
        let inner = self.lock()?;
        let messages = inner
            .room
            .messages
            .iter()
            .map(|message| MessageView {
                read_by: inner.room.messages.readers_of(message.id),
                message: message.clone(),
            })
            .collect();

        Ok(RoomSnapshot {
            state: inner.state,
            messages,
            online: inner.room.presence.snapshot(),
            page: inner.room.cursor.page(),
            history_exhausted: inner.room.cursor.is_exhausted(),
        })
    }
}

/// Releases the pagination slot if a fetch does not complete, including
/// when the `load_older_page` future is dropped mid-flight.
struct FetchGuard<'a> {
    inner: &'a Mutex<SessionInner>,
    armed: bool,
}

impl<'a> FetchGuard<'a> {
    fn new(inner: &'a Mutex<SessionInner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut inner) = self.inner.lock() {
            inner.room.cursor.abort_fetch();
        }
    }
}

async fn emit(events_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if events_tx.send(event).await.is_err() {
        trace!("No event listener, dropping session event");
    }
}

/// Apply connection events to the room state, one at a time, in order.
async fn pump(
    inner: Arc<Mutex<SessionInner>>,
    mut conn_rx: mpsc::Receiver<ConnectionEvent>,
    events_tx: mpsc::Sender<SessionEvent>,
) {
    while let Some(event) = conn_rx.recv().await {
        let outgoing = {
            let Ok(mut guard) = inner.lock() else {
                warn!("Session state lock poisoned, stopping event pump");
                break;
            };
            let inner = &mut *guard;

            match event {
                ConnectionEvent::Opened => {
                    if inner.state == SessionState::Connecting {
                        inner.state = SessionState::Active;
                        info!("Session active");
                        vec![SessionEvent::StateChanged(SessionState::Active)]
                    } else {
                        Vec::new()
                    }
                }

                ConnectionEvent::Frame(raw) => {
                    match inner.dispatcher.handle(&raw, &mut inner.room) {
                        Ok(event) => event.into_iter().collect(),
                        Err(e) => {
                            warn!(error = %e, "Dropping malformed frame");
                            Vec::new()
                        }
                    }
                }

                ConnectionEvent::Closed(reason) => {
                    if inner.state == SessionState::Closed {
                        debug!(reason = %reason, "Connection closed after stop");
                        Vec::new()
                    } else {
                        inner.state = SessionState::Closed;
                        warn!(reason = %reason, "Connection lost");
                        vec![
                            SessionEvent::ConnectionLost { reason },
                            SessionEvent::StateChanged(SessionState::Closed),
                        ]
                    }
                }
            }
        };

        for event in outgoing {
            emit(&events_tx, event).await;
        }
    }
    debug!("Event pump finished");
}
