//! The chat client facade: lifecycle, sends, and event subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use chatline_protocol::frames::ClientFrame;

use crate::events::{ClientEvent, EventBus, EventKind, SubscriptionId};
use crate::reconnection::{cancel_pending_reconnect, connect_inner, send_auth};
use crate::socket::{ChatSocket, ClientError};
use crate::types::{ClientConfig, ClientState};

/// Shared state behind every [`ChatClient`] handle, the socket
/// callbacks, and the reconnect timer task.
pub(crate) struct ClientShared {
    pub(crate) config: ClientConfig,
    pub(crate) state: StdRwLock<ClientState>,
    pub(crate) user_id: StdMutex<Option<String>>,
    pub(crate) socket: Mutex<Option<ChatSocket>>,
    pub(crate) events: EventBus,
    /// The one allowed pending reconnect timer.
    pub(crate) reconnect_pending: StdMutex<Option<CancellationToken>>,
    /// Set on explicit disconnect so the closure callback won't
    /// schedule a reconnect.
    pub(crate) manual_disconnect: AtomicBool,
}

/// Client connection manager for the chat transport.
///
/// Owns at most one live socket. After an unexpected closure it
/// schedules a single reconnect attempt per closure and re-sends `auth`
/// once the socket reopens, so callers authenticate once and stay
/// authenticated across interruptions.
pub struct ChatClient {
    shared: Arc<ClientShared>,
}

impl ChatClient {
    /// Creates a client for the given endpoint. Nothing connects until
    /// [`connect`](Self::connect) or [`authenticate`](Self::authenticate).
    pub fn new(config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                config,
                state: StdRwLock::new(ClientState::Disconnected),
                user_id: StdMutex::new(None),
                socket: Mutex::new(None),
                events: EventBus::new(),
                reconnect_pending: StdMutex::new(None),
                manual_disconnect: AtomicBool::new(false),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.shared.state.read().unwrap()
    }

    /// Opens the socket if no attempt is already in flight.
    ///
    /// An explicit connect clears the manual-disconnect latch and any
    /// pending reconnect timer.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.shared.manual_disconnect.store(false, Ordering::Relaxed);
        cancel_pending_reconnect(&self.shared);
        connect_inner(&self.shared).await
    }

    /// Stores the user identifier and authenticates.
    ///
    /// Idempotent: sends `auth` immediately when the socket is open,
    /// otherwise connects first (the open handler sends `auth` with the
    /// stored identifier).
    pub async fn authenticate(&self, user_id: &str) -> Result<(), ClientError> {
        *self.shared.user_id.lock().unwrap() = Some(user_id.to_string());
        match self.state() {
            ClientState::ConnectedUnauthenticated | ClientState::ConnectedAuthenticated => {
                send_auth(&self.shared, user_id).await
            }
            ClientState::Connecting | ClientState::Disconnected => self.connect().await,
        }
    }

    /// Sends a chat message to `receiver_id`.
    ///
    /// There is no internal queueing: when the connection is not
    /// authenticated the message is dropped with a warning and a
    /// `NotConnected` error so the caller can surface the state.
    pub async fn send_message(&self, receiver_id: &str, content: &str) -> Result<(), ClientError> {
        self.send_when_authenticated(ClientFrame::NewMessage {
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
        })
        .await
    }

    /// Marks the message as read. Same preconditions as
    /// [`send_message`](Self::send_message).
    pub async fn mark_read(&self, message_id: &str) -> Result<(), ClientError> {
        self.send_when_authenticated(ClientFrame::MarkRead {
            message_id: message_id.to_string(),
        })
        .await
    }

    /// Closes the socket and stays down: clears the pending reconnect
    /// timer and schedules nothing further.
    pub async fn disconnect(&self) {
        self.shared.manual_disconnect.store(true, Ordering::Relaxed);
        cancel_pending_reconnect(&self.shared);

        let socket = self.shared.socket.lock().await.take();
        let was = {
            let mut state = self.shared.state.write().unwrap();
            std::mem::replace(&mut *state, ClientState::Disconnected)
        };
        if let Some(socket) = socket {
            socket.close().await;
        }
        if was != ClientState::Disconnected {
            self.shared.events.emit(&ClientEvent::Closed);
        }
    }

    /// Subscribes to one event kind. Returns an opaque handle for
    /// [`off`](Self::off).
    pub fn on<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, callback)
    }

    /// Removes a subscription. Safe to call from UI teardown code; a
    /// handle that was never registered is ignored.
    pub fn off(&self, id: SubscriptionId) {
        self.shared.events.off(id);
    }

    async fn send_when_authenticated(&self, frame: ClientFrame) -> Result<(), ClientError> {
        if self.state() != ClientState::ConnectedAuthenticated {
            warn!("dropping frame: connection is not authenticated");
            return Err(ClientError::NotConnected);
        }
        let guard = self.shared.socket.lock().await;
        let socket = guard.as_ref().ok_or(ClientError::NotConnected)?;
        socket.send(&frame).await
    }
}
