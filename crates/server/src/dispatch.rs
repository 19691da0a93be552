//! Dispatcher: turns one inbound frame plus its originating connection
//! into store calls and outbound pushes.
//!
//! Stateless: durable state lives in the [`MessageStore`], routing state
//! in the [`SessionRegistry`]. A precondition violation yields a single
//! `error` frame back to the offender and no side effect; the dispatcher
//! never closes a connection over a bad request.

use std::sync::Arc;

use chatline_protocol::frames::{ClientFrame, ServerFrame};
use chatline_protocol::types::is_valid_user_id;

use crate::connection::Sender;
use crate::registry::SessionRegistry;
use crate::store::MessageStore;

pub struct Dispatcher {
    registry: SessionRegistry,
    store: Arc<dyn MessageStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn MessageStore>) -> Arc<Self> {
        Arc::new(Self {
            registry: SessionRegistry::new(),
            store,
        })
    }

    /// The registry this dispatcher routes through.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handles one decoded frame from `sender`'s read loop.
    pub async fn dispatch(&self, frame: ClientFrame, sender: &Sender) {
        match frame {
            ClientFrame::Auth { user_id } => self.handle_auth(&user_id, sender),
            ClientFrame::NewMessage {
                receiver_id,
                content,
            } => self.handle_new_message(&receiver_id, &content, sender).await,
            ClientFrame::MarkRead { message_id } => {
                self.handle_mark_read(&message_id, sender).await
            }
            ClientFrame::Unknown => {
                // Forward compatibility: ignored, never fatal.
                tracing::warn!(conn = sender.id(), "unknown frame discriminator, ignoring");
            }
        }
    }

    /// Removes the registry binding when a connection's pumps exit.
    pub(crate) fn connection_closed(&self, sender: &Sender) {
        self.registry.unbind(sender.id());
    }

    fn handle_auth(&self, user_id: &str, sender: &Sender) {
        if !is_valid_user_id(user_id) {
            self.reject(sender, "invalid user id");
            return;
        }

        self.registry.bind(user_id, sender.clone());
        let _ = sender.send(&ServerFrame::AuthSuccess {
            user_id: user_id.to_string(),
        });
    }

    async fn handle_new_message(&self, receiver_id: &str, content: &str, sender: &Sender) {
        let Some(sender_user) = self.registry.user_for(sender.id()) else {
            self.reject(sender, "not authenticated");
            return;
        };
        if content.trim().is_empty() {
            self.reject(sender, "message content must not be empty");
            return;
        }
        // Receiver existence is deliberately not checked; a deleted
        // account must not break message history.
        if !is_valid_user_id(receiver_id) {
            self.reject(sender, "invalid receiver id");
            return;
        }

        let message = match self.store.insert(&sender_user, receiver_id, content).await {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(user = %sender_user, "message insert failed: {e}");
                self.reject(sender, "could not store message");
                return;
            }
        };

        let _ = sender.send(&ServerFrame::MessageSent {
            message: message.clone(),
        });

        // Push to the receiver only if a live connection is bound;
        // otherwise the peer sees the message on its next fetch.
        if let Some(peer) = self.registry.lookup(receiver_id) {
            let _ = peer.send(&ServerFrame::NewMessage { message });
        }
    }

    async fn handle_mark_read(&self, message_id: &str, sender: &Sender) {
        let Some(reader) = self.registry.user_for(sender.id()) else {
            self.reject(sender, "not authenticated");
            return;
        };

        let message = match self.store.get(message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.reject(sender, "unknown message");
                return;
            }
            Err(e) => {
                tracing::error!(user = %reader, "message lookup failed: {e}");
                self.reject(sender, "could not read message");
                return;
            }
        };

        if message.receiver_id != reader {
            self.reject(sender, "not the receiver of this message");
            return;
        }

        match self.store.mark_read(message_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.reject(sender, "unknown message");
                return;
            }
            Err(e) => {
                tracing::error!(user = %reader, "mark read failed: {e}");
                self.reject(sender, "could not update message");
                return;
            }
        }

        let _ = sender.send(&ServerFrame::MarkReadStatus {
            success: true,
            message_id: message_id.to_string(),
        });

        // Read-receipt to the original sender, if reachable.
        if let Some(origin) = self.registry.lookup(&message.sender_id) {
            let _ = origin.send(&ServerFrame::MessageRead {
                message_id: message_id.to_string(),
            });
        }
    }

    fn reject(&self, sender: &Sender, message: &str) {
        tracing::debug!(conn = sender.id(), "rejected request: {message}");
        let _ = sender.send(&ServerFrame::error(message));
    }
}
