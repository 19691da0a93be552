//! Session registry: the single owner of the userId → connection map.
//!
//! Every question of the form "is user U currently reachable" is answered
//! here and nowhere else. The map is rebuilt from scratch on process
//! restart; clients re-authenticate after any reconnect.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::connection::{ConnectionId, Sender};

/// Process-wide table mapping an authenticated user identifier to its
/// one live connection.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Sender>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `user_id` to `sender`, overwriting any prior binding.
    ///
    /// A superseded connection is not closed; it simply stops being the
    /// delivery target and cleans itself up when its own socket dies.
    pub fn bind(&self, user_id: &str, sender: Sender) {
        let prior = self
            .sessions
            .write()
            .unwrap()
            .insert(user_id.to_string(), sender);
        if prior.is_some() {
            tracing::debug!(user = %user_id, "superseded prior binding");
        }
        tracing::info!(user = %user_id, "bound connection");
    }

    /// Removes every entry still pointing at exactly this connection.
    ///
    /// No-op when the connection was already superseded, which leaves the
    /// superseding entry untouched.
    pub fn unbind(&self, conn_id: ConnectionId) {
        self.sessions.write().unwrap().retain(|user_id, sender| {
            let stale = sender.id() == conn_id;
            if stale {
                tracing::info!(user = %user_id, "unbound connection");
            }
            !stale
        });
    }

    /// Returns the live connection for `user_id`, if any.
    pub fn lookup(&self, user_id: &str) -> Option<Sender> {
        self.sessions.read().unwrap().get(user_id).cloned()
    }

    /// Reverse lookup: the user identifier currently bound to this
    /// connection, if any.
    pub fn user_for(&self, conn_id: ConnectionId) -> Option<String> {
        self.sessions
            .read()
            .unwrap()
            .iter()
            .find(|(_, sender)| sender.id() == conn_id)
            .map(|(user_id, _)| user_id.clone())
    }
}
