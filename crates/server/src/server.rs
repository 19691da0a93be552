//! Chat transport server.
//!
//! Listens on a TCP port, upgrades HTTP GET on the well-known chat path
//! to WebSocket, and runs one connection per client. All routing goes
//! through the shared [`Dispatcher`].

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;

use chatline_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PATH};

use crate::ServerError;
use crate::connection::spawn_connection;
use crate::dispatch::Dispatcher;
use crate::store::MessageStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 0 }
    }
}

/// The chat WebSocket server.
///
/// Accepts any number of client connections and dispatches their frames
/// through one shared [`Dispatcher`].
pub struct ChatServer {
    port: u16,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl ChatServer {
    /// Creates a new server over the given storage collaborator.
    pub fn new(config: ServerConfig, store: Arc<dyn MessageStore>) -> Arc<Self> {
        Arc::new(Self {
            port: config.port,
            dispatcher: Dispatcher::new(store),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// The dispatcher (and through it the session registry) this server
    /// routes with.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Gracefully shuts down the server and every live connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = TcpListener::bind(addr).await?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("chat server listening on {local_addr}{WS_PATH}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::debug!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Upgrades one TCP connection and spawns its pumps.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

        // Only the well-known chat path upgrades; the rest of the host's
        // surface belongs to the embedding application.
        let callback = |req: &Request, response: Response| {
            if req.uri().path() == WS_PATH {
                Ok(response)
            } else {
                tracing::warn!(path = %req.uri().path(), "rejecting upgrade on unknown path");
                let mut resp = ErrorResponse::new(Some("not found".into()));
                *resp.status_mut() = StatusCode::NOT_FOUND;
                Err(resp)
            }
        };

        let ws_stream = accept_hdr_async_with_config(stream, callback, Some(ws_config)).await?;
        tracing::info!(%peer_addr, "WebSocket connection established");

        spawn_connection(
            ws_stream,
            peer_addr.to_string(),
            Arc::clone(&self.dispatcher),
            self.cancel.clone(),
        );

        Ok(())
    }
}
