//! WebSocket write pump — serialises outbound messages.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Writes messages to the WebSocket.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("WebSocket write error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}
