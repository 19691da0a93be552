//! Connection lifecycle and reconnect scheduling.
//!
//! Free functions over the shared [`ClientShared`] state so the socket
//! callbacks and the reconnect timer task can drive the same state
//! machine as the public [`ChatClient`](crate::ChatClient) methods.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatline_protocol::frames::{ClientFrame, ServerFrame};

use crate::events::ClientEvent;
use crate::manager::ClientShared;
use crate::socket::{ChatSocket, ClientError};
use crate::types::ClientState;

/// Cancels the pending reconnect timer, if any.
pub(crate) fn cancel_pending_reconnect(shared: &ClientShared) {
    if let Some(token) = shared.reconnect_pending.lock().unwrap().take() {
        token.cancel();
    }
}

/// Opens the socket and advances the state machine.
///
/// No-op when a connect attempt is already in flight or a socket is
/// already open; there is never more than one attempt at a time.
pub(crate) async fn connect_inner(shared: &Arc<ClientShared>) -> Result<(), ClientError> {
    {
        let mut state = shared.state.write().unwrap();
        match *state {
            ClientState::Disconnected => *state = ClientState::Connecting,
            _ => return Ok(()),
        }
    }

    let socket = match ChatSocket::connect(&shared.config.url).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(url = %shared.config.url, "connect failed: {e}");
            enter_disconnected(shared);
            return Err(e);
        }
    };

    // Install callbacks before storing the socket so no frame can slip
    // past unobserved.
    setup_socket_callbacks(&socket, shared).await;

    *shared.socket.lock().await = Some(socket);
    *shared.state.write().unwrap() = ClientState::ConnectedUnauthenticated;
    shared.events.emit(&ClientEvent::Opened);
    info!(url = %shared.config.url, "socket opened");

    // Re-authenticate immediately when an identity is already known.
    let known = shared.user_id.lock().unwrap().clone();
    if let Some(user_id) = known {
        send_auth(shared, &user_id).await?;
    }
    Ok(())
}

/// Sends an `auth` frame for the given identifier over the open socket.
pub(crate) async fn send_auth(
    shared: &Arc<ClientShared>,
    user_id: &str,
) -> Result<(), ClientError> {
    let guard = shared.socket.lock().await;
    let socket = guard.as_ref().ok_or(ClientError::NotConnected)?;
    socket
        .send(&ClientFrame::Auth {
            user_id: user_id.to_string(),
        })
        .await
}

/// Installs frame and disconnect callbacks on a fresh socket.
async fn setup_socket_callbacks(socket: &ChatSocket, shared: &Arc<ClientShared>) {
    let frame_shared = shared.clone();
    socket
        .set_frame_callback(Box::new(move |frame| {
            handle_frame(&frame_shared, frame);
        }))
        .await;

    let disconnect_shared = shared.clone();
    socket
        .set_disconnect_callback(Box::new(move || {
            enter_disconnected(&disconnect_shared);
        }))
        .await;
}

/// Handles one decoded server frame.
fn handle_frame(shared: &Arc<ClientShared>, frame: ServerFrame) {
    if let ServerFrame::Unknown = frame {
        // Forward compatibility: ignored, never fatal.
        warn!("unknown frame discriminator, ignoring");
        return;
    }

    if let ServerFrame::AuthSuccess { user_id } = &frame {
        *shared.state.write().unwrap() = ClientState::ConnectedAuthenticated;
        info!(user = %user_id, "authenticated");
    }
    if let ServerFrame::Error { message } = &frame {
        warn!("server rejected a request: {message}");
    }

    shared.events.emit(&ClientEvent::Frame(frame.clone()));

    // Pre-demultiplexed convenience events.
    match frame {
        ServerFrame::NewMessage { message } => {
            shared.events.emit(&ClientEvent::NewMessage(message));
        }
        ServerFrame::MessageSent { message } => {
            shared.events.emit(&ClientEvent::MessageSent(message));
        }
        ServerFrame::MessageRead { message_id } => {
            shared.events.emit(&ClientEvent::MessageRead { message_id });
        }
        _ => {}
    }
}

/// Transition into `Disconnected` from any state.
///
/// Emits `Closed` once per closure and schedules exactly one reconnect
/// attempt, unless the disconnect was manual, no identity is known, or
/// a timer is already pending.
pub(crate) fn enter_disconnected(shared: &Arc<ClientShared>) {
    // Drop the dead socket if the slot is free to inspect; a concurrent
    // connect will replace it anyway.
    if let Ok(mut slot) = shared.socket.try_lock() {
        slot.take();
    }

    let was = {
        let mut state = shared.state.write().unwrap();
        std::mem::replace(&mut *state, ClientState::Disconnected)
    };
    if was == ClientState::Disconnected {
        return;
    }

    shared.events.emit(&ClientEvent::Closed);
    debug!("socket closed");

    if shared.manual_disconnect.load(Ordering::Relaxed) {
        return;
    }
    if shared.user_id.lock().unwrap().is_none() {
        debug!("no identity known, not scheduling reconnect");
        return;
    }
    schedule_reconnect(shared);
}

/// Schedules one reconnect attempt after the fixed delay.
///
/// Only one timer may be pending at a time; entering `Disconnected`
/// while one is pending does not schedule a second.
pub(crate) fn schedule_reconnect(shared: &Arc<ClientShared>) {
    {
        let mut pending = shared.reconnect_pending.lock().unwrap();
        if pending.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *pending = Some(token.clone());
        info!(delay = ?shared.config.reconnect_delay, "scheduling reconnect");
        tokio::spawn(reconnect_task(shared.clone(), token));
    }
}

/// Waits out the delay, then reconnects.
///
/// Returns a boxed future to break the recursive type cycle: a failed
/// attempt re-enters `Disconnected`, which schedules this task again.
fn reconnect_task(
    shared: Arc<ClientShared>,
    cancel: CancellationToken,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(shared.config.reconnect_delay) => {}
        }

        // The timer has fired; free the slot before attempting so the
        // next closure can schedule again.
        shared.reconnect_pending.lock().unwrap().take();

        if shared.manual_disconnect.load(Ordering::Relaxed) {
            return;
        }

        match connect_inner(&shared).await {
            Ok(()) => info!("reconnected"),
            Err(e) => {
                // connect_inner already re-entered Disconnected and
                // scheduled the next attempt.
                warn!("reconnect attempt failed: {e}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex as StdMutex;
    use std::sync::RwLock as StdRwLock;
    use std::sync::atomic::AtomicBool;

    use crate::events::EventBus;
    use crate::types::ClientConfig;

    fn shared() -> Arc<ClientShared> {
        Arc::new(ClientShared {
            config: ClientConfig::new("ws://127.0.0.1:9/ws"),
            state: StdRwLock::new(ClientState::Disconnected),
            user_id: StdMutex::new(None),
            socket: tokio::sync::Mutex::new(None),
            events: EventBus::new(),
            reconnect_pending: StdMutex::new(None),
            manual_disconnect: AtomicBool::new(false),
        })
    }

    #[test]
    fn cancel_pending_reconnect_clears_token() {
        let shared = shared();
        let token = CancellationToken::new();
        *shared.reconnect_pending.lock().unwrap() = Some(token.clone());

        cancel_pending_reconnect(&shared);

        assert!(shared.reconnect_pending.lock().unwrap().is_none());
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_pending_reconnect_without_timer_is_noop() {
        let shared = shared();
        cancel_pending_reconnect(&shared);
        assert!(shared.reconnect_pending.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn schedule_reconnect_keeps_single_timer() {
        let shared = shared();
        *shared.user_id.lock().unwrap() = Some("7".into());

        schedule_reconnect(&shared);
        let first = shared.reconnect_pending.lock().unwrap().clone();
        assert!(first.is_some());

        // A second closure while the timer is pending schedules nothing.
        schedule_reconnect(&shared);
        let second = shared.reconnect_pending.lock().unwrap().clone();
        assert!(second.is_some());

        cancel_pending_reconnect(&shared);
    }

    #[tokio::test]
    async fn enter_disconnected_without_identity_schedules_nothing() {
        let shared = shared();
        *shared.state.write().unwrap() = ClientState::ConnectedUnauthenticated;

        enter_disconnected(&shared);

        assert_eq!(*shared.state.read().unwrap(), ClientState::Disconnected);
        assert!(shared.reconnect_pending.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn enter_disconnected_with_identity_schedules_once() {
        let shared = shared();
        *shared.user_id.lock().unwrap() = Some("7".into());
        *shared.state.write().unwrap() = ClientState::ConnectedAuthenticated;

        enter_disconnected(&shared);

        assert_eq!(*shared.state.read().unwrap(), ClientState::Disconnected);
        assert!(shared.reconnect_pending.lock().unwrap().is_some());

        // Re-entering while already down is a no-op.
        enter_disconnected(&shared);
        cancel_pending_reconnect(&shared);
    }

    #[tokio::test]
    async fn manual_disconnect_suppresses_scheduling() {
        let shared = shared();
        *shared.user_id.lock().unwrap() = Some("7".into());
        *shared.state.write().unwrap() = ClientState::ConnectedAuthenticated;
        shared
            .manual_disconnect
            .store(true, std::sync::atomic::Ordering::Relaxed);

        enter_disconnected(&shared);

        assert!(shared.reconnect_pending.lock().unwrap().is_none());
    }
}
