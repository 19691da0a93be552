//! Public types for the client connection manager.

use std::time::Duration;

use chatline_protocol::constants::RECONNECT_DELAY;

/// Lifecycle state of the chat connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No socket; initial state, and where every closure lands.
    Disconnected,
    /// Connect attempt in flight.
    Connecting,
    /// Socket open, `auth` not yet confirmed.
    ConnectedUnauthenticated,
    /// Socket open and bound to the stored user identifier.
    ConnectedAuthenticated,
}

/// Configuration for the client connection manager.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the chat upgrade endpoint.
    pub url: String,
    /// Fixed delay before a scheduled reconnect attempt.
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    /// Creates a config for the given upgrade URL with the default
    /// reconnect delay.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_fixed_reconnect_delay() {
        let config = ClientConfig::new("ws://localhost:8080/ws");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.url, "ws://localhost:8080/ws");
    }

    #[test]
    fn client_state_equality() {
        assert_eq!(ClientState::Disconnected, ClientState::Disconnected);
        assert_ne!(
            ClientState::ConnectedUnauthenticated,
            ClientState::ConnectedAuthenticated,
        );
    }
}
