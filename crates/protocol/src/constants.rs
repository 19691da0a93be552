use std::time::Duration;

/// Well-known HTTP upgrade path for the chat transport.
///
/// The transport shares its host and port with the rest of the
/// application, so the server only upgrades requests for this path.
pub const WS_PATH: &str = "/ws";

/// How often the server sends keepalive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(20);

/// Idle deadline: if *nothing* arrives within this window (no pong, no
/// frame), the connection is considered dead. Any inbound traffic resets
/// the deadline.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum frame size in bytes. Chat frames are small; anything larger
/// is dropped before decoding.
pub const WS_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Fixed delay before a client schedules a reconnect attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Maps an HTTP(S) origin to the matching WebSocket upgrade URL.
///
/// Pages loaded over an encrypted origin upgrade over the encrypted
/// variant of the transport.
pub fn ws_url(origin: &str) -> String {
    let origin = origin.trim_end_matches('/');
    if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{rest}{WS_PATH}")
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{rest}{WS_PATH}")
    } else {
        format!("ws://{origin}{WS_PATH}")
    }
}
