//! Connection lifecycle: read/write pumps and the send handle.
//!
//! One task pair per socket. The read pump decodes inbound frames and
//! hands them to the [`Dispatcher`]; the write pump drains the send
//! channel and emits keepalive pings. A decode error on one frame is
//! reported and the loop continues.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use chatline_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT};
use chatline_protocol::frames::{ClientFrame, ServerFrame};

use crate::SEND_BUFFER_SIZE;
use crate::dispatch::Dispatcher;

/// Process-unique identifier for one live connection.
///
/// Used by the registry to tell whether an entry still points at this
/// exact connection after a later binding may have superseded it.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for pushing frames to one connected client.
///
/// Cloneable and cheap — wraps an `mpsc::Sender`.
#[derive(Clone)]
pub struct Sender {
    id: ConnectionId,
    tx: mpsc::Sender<WsMessage>,
}

impl Sender {
    /// Returns this connection's process-unique id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Encodes and sends one [`ServerFrame`] as JSON text.
    ///
    /// Returns `Err` if the socket is not open or its buffer is full.
    pub fn send(&self, frame: &ServerFrame) -> Result<(), SendError> {
        let json = frame.encode().map_err(|_| SendError)?;
        self.tx.try_send(WsMessage::Text(json.into())).map_err(|_| {
            tracing::warn!(conn = self.id, "send buffer full or closed, dropping frame");
            SendError
        })
    }

    /// Returns `true` if the send channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: ConnectionId, tx: mpsc::Sender<WsMessage>) -> Self {
        Self { id, tx }
    }
}

/// Error returned when the send channel is full or closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: connection not open")]
pub struct SendError;

/// Spawns the read and write pumps for an upgraded WebSocket.
///
/// Returns the [`Sender`] handle. The pumps stop when the socket closes,
/// the idle deadline fires, or the server cancel token is triggered; on
/// exit the dispatcher is told so the registry entry is removed.
pub(crate) fn spawn_connection<S>(
    ws_stream: S,
    peer: String,
    dispatcher: Arc<Dispatcher>,
    server_cancel: CancellationToken,
) -> Sender
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
{
    let (tx, rx) = mpsc::channel::<WsMessage>(SEND_BUFFER_SIZE);
    let cancel = server_cancel.child_token();
    let sender = Sender {
        id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        tx,
    };

    let (ws_sink, ws_stream) = ws_stream.split();

    // Write pump.
    tokio::spawn(write_pump(ws_sink, rx, cancel.clone()));

    // Read pump.
    let read_sender = sender.clone();
    tokio::spawn(async move {
        read_pump(ws_stream, read_sender.clone(), dispatcher.clone(), cancel.clone()).await;
        // When the read pump exits, stop the write pump too.
        cancel.cancel();
        dispatcher.connection_closed(&read_sender);
        tracing::info!(conn = read_sender.id(), %peer, "connection closed");
    });

    sender
}

/// Write pump: drains the send channel and sends keepalive pings.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<WsMessage>, cancel: CancellationToken)
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(WS_PING_PERIOD);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = rx.recv() => {
                match msg {
                    Some(ws_msg) => {
                        if let Err(e) = sink.send(ws_msg).await {
                            tracing::error!("write pump send error: {e}");
                            break;
                        }
                    }
                    None => break, // Channel closed.
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::error!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sink.close().await;
}

/// Read pump: decodes inbound frames and hands them to the dispatcher.
///
/// Any inbound traffic resets the idle deadline; silence past
/// [`WS_PONG_WAIT`] means the peer is gone and the pump exits.
async fn read_pump<S>(
    mut stream: S,
    sender: Sender,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
{
    let idle_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(idle_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut idle_deadline => {
                tracing::warn!(conn = sender.id(), "idle timeout, closing connection");
                break;
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(ws_msg)) => {
                        idle_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match ws_msg {
                            WsMessage::Text(text) => {
                                if text.len() > WS_MAX_MESSAGE_SIZE {
                                    tracing::warn!(conn = sender.id(), "frame too large ({} bytes), dropping", text.len());
                                    continue;
                                }
                                match ClientFrame::decode(&text) {
                                    Ok(frame) => dispatcher.dispatch(frame, &sender).await,
                                    Err(e) => {
                                        // Frame-level failure only; the connection stays open.
                                        tracing::warn!(conn = sender.id(), "undecodable frame: {e}");
                                    }
                                }
                            }
                            WsMessage::Ping(data) => {
                                let _ = sender.tx.try_send(WsMessage::Pong(data));
                            }
                            WsMessage::Pong(_) => {}
                            WsMessage::Close(_) => {
                                tracing::debug!(conn = sender.id(), "received close frame");
                                break;
                            }
                            _ => {} // Binary and raw frames ignored.
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(conn = sender.id(), "read pump error: {e}");
                        break;
                    }
                    None => break, // Stream ended.
                }
            }
        }
    }
}
