//! Binary WebSocket trigger channel.
//!
//! The request head has already been consumed by the HTTP layer when a
//! `/ws` upgrade is detected, so the handshake is completed by hand: compute
//! the RFC 6455 accept key, write the `101 Switching Protocols` response,
//! then hand the raw stream to tungstenite in server role.
//!
//! Channel semantics, chosen for latency over reliability:
//!
//! - Each inbound binary frame carries exactly one unsigned byte, a catalog
//!   index. In-range indices dispatch fire-and-forget; out-of-range bytes
//!   are logged and ignored — no error frame goes back.
//! - The server never sends frames on this channel, and no acknowledgement
//!   exists.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::StreamExt;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

/// GUID appended to the client key per RFC 6455 §4.2.2.
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value for a client key.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Completes the upgrade and runs the trigger loop until the peer goes away.
///
/// `on_trigger` receives each in-range index; it must be cheap (the router's
/// implementation just spawns the detached dispatch).
///
/// # Errors
///
/// Returns an error only when the `101` response cannot be written; once the
/// channel is up, peer-side failures end the loop silently.
pub async fn serve_trigger_channel<S, F>(
    mut stream: S,
    client_key: &str,
    pattern_count: usize,
    on_trigger: F,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(u8),
{
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n",
        accept = accept_key(client_key),
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    let mut ws = WebSocketStream::from_raw_socket(stream, Role::Server, None).await;
    debug!("trigger channel established");

    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Binary(payload)) => {
                let Some(&index) = payload.first() else {
                    debug!("empty trigger frame ignored");
                    continue;
                };
                if (index as usize) < pattern_count {
                    on_trigger(index);
                } else {
                    debug!(index, pattern_count, "trigger index out of range, ignored");
                }
            }
            Ok(Message::Close(_)) => {
                debug!("trigger channel closed by peer");
                break;
            }
            Ok(Message::Text(_)) => {
                // Binary-only channel; a text frame means a confused client.
                warn!("text frame on trigger channel ignored");
            }
            Ok(_) => {} // ping/pong/raw frames
            Err(err) => {
                debug!(%err, "trigger channel error, closing");
                break;
            }
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
