//! WebSocket transport server for Chatline.
//!
//! Accepts chat connections on a well-known upgrade path, binds each
//! authenticated socket in the [`SessionRegistry`], and routes
//! `new_message`/`mark_read` frames through the [`Dispatcher`] to the
//! storage collaborator and to any live peer connection.

mod connection;
mod dispatch;
mod registry;
mod server;
mod store;

pub use connection::{ConnectionId, SendError, Sender};
pub use dispatch::Dispatcher;
pub use registry::SessionRegistry;
pub use server::{ChatServer, ServerConfig};
pub use store::{MemoryStore, MessageStore, StoreError, StoreFuture};

/// Send buffer capacity per connection.
///
/// Chat pushes are small and infrequent; a full buffer means the peer has
/// stopped draining and the frame is dropped with a warning.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the transport server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
