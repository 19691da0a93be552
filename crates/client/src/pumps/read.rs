//! WebSocket read pump — decodes and dispatches inbound frames.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use chatline_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT};
use chatline_protocol::frames::ServerFrame;

use crate::socket::{DisconnectCallback, FrameCallback};

/// Reads messages from the WebSocket and dispatches decoded frames.
///
/// Uses an idle deadline to detect dead connections: if *nothing*
/// arrives within [`WS_PONG_WAIT`] the connection is considered dead
/// and the loop exits (triggering the disconnect callback).
pub(crate) async fn read_pump<S>(
    mut read: S,
    on_frame: Arc<Mutex<Option<FrameCallback>>>,
    on_disconnect: DisconnectCallback,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let idle_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(idle_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut idle_deadline => {
                warn!("idle timeout — connection dead, closing");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        // ANY incoming message resets the deadline.
                        idle_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text_frame(&text, &on_frame).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(_) => {
                                debug!("received close frame");
                                break;
                            }
                            _ => {} // Binary — ignore
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    if let Some(cb) = on_disconnect.lock().await.as_ref() {
        cb();
    }
}

/// Decodes one text frame and hands it to the frame callback.
async fn handle_text_frame(text: &str, on_frame: &Arc<Mutex<Option<FrameCallback>>>) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("frame too large ({} bytes), dropping", text.len());
        return;
    }

    let frame = match ServerFrame::decode(text) {
        Ok(f) => f,
        Err(e) => {
            // Frame-level failure only; the connection stays open.
            warn!("failed to parse frame: {e}");
            return;
        }
    };

    trace!(frame = ?frame, "received frame");

    let guard = on_frame.lock().await;
    if let Some(cb) = guard.as_ref() {
        cb(frame);
    } else {
        warn!("no frame callback set — dropping frame");
    }
}
