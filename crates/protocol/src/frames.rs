use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::types::ChatMessage;

/// Frames sent by a client over the chat socket.
///
/// One complete JSON object per frame, discriminated by the top-level
/// `type` field. The `new_message` discriminator is shared with the
/// server-to-client direction; direction context disambiguates which
/// payload applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Binds this socket to an authenticated user identifier.
    #[serde(rename_all = "camelCase")]
    Auth { user_id: String },

    /// Sends a chat message to another user.
    #[serde(rename_all = "camelCase")]
    NewMessage { receiver_id: String, content: String },

    /// Marks a message addressed to the caller as read.
    #[serde(rename_all = "camelCase")]
    MarkRead { message_id: String },

    /// Forward compatibility: unknown discriminators deserialize here
    /// and are ignored, never fatal.
    #[serde(other)]
    Unknown,
}

/// Frames pushed by the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Confirms that the socket is now bound to `user_id`.
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: String },

    /// A message addressed to this client, with server-assigned id and
    /// timestamp.
    NewMessage { message: ChatMessage },

    /// Acknowledgment to the original sender carrying the persisted
    /// message.
    MessageSent { message: ChatMessage },

    /// Read-receipt: the addressed peer has read `message_id`.
    #[serde(rename_all = "camelCase")]
    MessageRead { message_id: String },

    /// Acknowledgment to the reader of a `mark_read` request.
    #[serde(rename_all = "camelCase")]
    MarkReadStatus { success: bool, message_id: String },

    /// A rejected request. Never closes the connection by itself.
    Error { message: String },

    /// Forward compatibility: unknown discriminators deserialize here.
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    /// Decodes one JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes this frame as a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerFrame {
    /// Decodes one JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes this frame as a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Shorthand for an `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }
}
