//! WebSocket socket wrapper for the chat client.
//!
//! Dumb transport plus framing: owns the read/write/ping pump tasks for
//! one socket and reports decoded frames and closure to its owner. No
//! retry logic lives here.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;

use chatline_protocol::constants::WS_MAX_MESSAGE_SIZE;
use chatline_protocol::frames::{ClientFrame, ServerFrame};

/// Errors from the chat client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] chatline_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    Closed,
}

/// Callback type for decoded server frames.
pub(crate) type FrameCallback = Box<dyn Fn(ServerFrame) + Send + Sync>;

/// Callback type for disconnect notification.
pub(crate) type DisconnectCallback = Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>>;

/// One live chat socket.
///
/// Created by [`ChatSocket::connect`]; dropped (or closed) when the
/// manager replaces it. Dropping aborts the pump tasks.
pub struct ChatSocket {
    write_tx: mpsc::Sender<tungstenite::Message>,
    on_frame: Arc<Mutex<Option<FrameCallback>>>,
    on_disconnect: DisconnectCallback,
    cancel: tokio_util::sync::CancellationToken,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
}

impl ChatSocket {
    /// Opens a WebSocket to the chat upgrade endpoint and starts the
    /// pumps.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(64);
        let on_frame: Arc<Mutex<Option<FrameCallback>>> = Arc::new(Mutex::new(None));
        let on_disconnect: DisconnectCallback = Arc::new(Mutex::new(None));
        let cancel = tokio_util::sync::CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::write::write_pump(write, write_rx, cancel))
        };

        let read_handle = {
            let on_frame = on_frame.clone();
            let on_disconnect = on_disconnect.clone();
            let cancel = cancel.clone();
            let write_tx = write_tx.clone();
            tokio::spawn(crate::pumps::read::read_pump(
                read,
                on_frame,
                on_disconnect,
                write_tx,
                cancel,
            ))
        };

        let ping_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::ping::ping_pump(write_tx, cancel))
        };

        Ok(Self {
            write_tx,
            on_frame,
            on_disconnect,
            cancel,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
        })
    }

    /// Sets the callback for decoded server frames.
    pub(crate) async fn set_frame_callback(&self, cb: FrameCallback) {
        *self.on_frame.lock().await = Some(cb);
    }

    /// Sets the callback for disconnection.
    pub(crate) async fn set_disconnect_callback(&self, cb: Box<dyn Fn() + Send + Sync>) {
        *self.on_disconnect.lock().await = Some(cb);
    }

    /// Encodes and sends one frame. Fails if the socket is not open.
    pub async fn send(&self, frame: &ClientFrame) -> Result<(), ClientError> {
        let json = frame.encode()?;
        self.write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Gracefully closes the socket.
    pub async fn close(&self) {
        self.cancel.cancel();
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}
