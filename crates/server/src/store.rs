//! Storage collaborator seam for persisted messages.
//!
//! The relational store behind the application is reached through this
//! trait; the REST fallback endpoints share the same seam. Writes are
//! single-row and individually atomic, so the dispatcher never needs a
//! rollback path.

use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use chatline_protocol::types::ChatMessage;

/// A boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors from the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-based persistence API for chat messages.
pub trait MessageStore: Send + Sync + 'static {
    /// Inserts a new unread message, assigning its id and a
    /// monotonically non-decreasing creation timestamp.
    fn insert(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> StoreFuture<'_, ChatMessage>;

    /// Returns the message with this id, if it exists.
    fn get(&self, message_id: &str) -> StoreFuture<'_, Option<ChatMessage>>;

    /// Flips the message's read flag to `true` and returns the updated
    /// row. Marking an already-read message is not an error.
    fn mark_read(&self, message_id: &str) -> StoreFuture<'_, Option<ChatMessage>>;

    /// Lists every message between the two users, either direction, in
    /// insertion order. This is the read path the fallback API serves.
    fn list_between(&self, user_a: &str, user_b: &str) -> StoreFuture<'_, Vec<ChatMessage>>;
}

/// Single-process in-memory store.
///
/// The transport assumes one server process over a shared store; this
/// implementation is that shared store for embedded and test use.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rows: Vec<ChatMessage>,
    last_created_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for MemoryStore {
    fn insert(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> StoreFuture<'_, ChatMessage> {
        let sender_id = sender_id.to_string();
        let receiver_id = receiver_id.to_string();
        let content = content.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().unwrap();
            // Clamp against the previous insert so timestamps never go
            // backwards even if the wall clock does.
            let now = Utc::now();
            let created_at = match inner.last_created_at {
                Some(last) if now < last => last,
                _ => now,
            };
            inner.last_created_at = Some(created_at);

            let message = ChatMessage {
                id: Uuid::new_v4().to_string(),
                sender_id,
                receiver_id,
                content,
                read: false,
                created_at,
            };
            inner.rows.push(message.clone());
            Ok(message)
        })
    }

    fn get(&self, message_id: &str) -> StoreFuture<'_, Option<ChatMessage>> {
        let message_id = message_id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().unwrap();
            Ok(inner.rows.iter().find(|m| m.id == message_id).cloned())
        })
    }

    fn mark_read(&self, message_id: &str) -> StoreFuture<'_, Option<ChatMessage>> {
        let message_id = message_id.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().unwrap();
            let row = inner.rows.iter_mut().find(|m| m.id == message_id);
            Ok(row.map(|m| {
                m.read = true;
                m.clone()
            }))
        })
    }

    fn list_between(&self, user_a: &str, user_b: &str) -> StoreFuture<'_, Vec<ChatMessage>> {
        let user_a = user_a.to_string();
        let user_b = user_b.to_string();
        Box::pin(async move {
            let inner = self.inner.read().unwrap();
            Ok(inner
                .rows
                .iter()
                .filter(|m| {
                    (m.sender_id == user_a && m.receiver_id == user_b)
                        || (m.sender_id == user_b && m.receiver_id == user_a)
                })
                .cloned()
                .collect())
        })
    }
}
