//! Client connection manager for the Chatline messaging transport.
//!
//! Owns the connect/disconnect lifecycle of one chat socket, reconnects
//! automatically after a fixed delay, re-authenticates after reconnect,
//! and fans decoded frames out to UI consumers through a typed
//! publish/subscribe interface.

pub mod events;
pub mod manager;
pub(crate) mod pumps;
pub(crate) mod reconnection;
pub mod socket;
pub mod types;

pub use events::{ClientEvent, EventKind, SubscriptionId};
pub use manager::ChatClient;
pub use socket::{ChatSocket, ClientError};
pub use types::{ClientConfig, ClientState};
