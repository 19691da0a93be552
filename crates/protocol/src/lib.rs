//! Wire protocol for the Chatline messaging transport.
//!
//! Defines the closed set of JSON frames exchanged between a chat client
//! and the transport server, the persisted [`ChatMessage`] entity, and the
//! transport constants shared by both sides.

pub mod constants;
pub mod frames;
pub mod types;

// Re-export primary types for convenience.
pub use frames::{ClientFrame, ServerFrame};
pub use types::{ChatMessage, is_valid_user_id};

/// Errors from encoding or decoding wire frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
