use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message.
///
/// Created only by the server in response to a validated `new_message`;
/// the only mutation ever applied is flipping `read` to `true`. The `id`
/// and `created_at` fields are server-assigned, with `created_at`
/// monotonically non-decreasing per insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Checks that a user identifier looks like a known identifier format.
///
/// Identity itself is issued by the auth collaborator; this only rejects
/// values that cannot be a valid identifier.
pub fn is_valid_user_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
