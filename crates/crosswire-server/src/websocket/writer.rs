//! Write loop: outbound drain plus ping keepalive. Sole writer of the
//! transport.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use crosswire_rpc::message::ResponseMessage;
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::mpsc;
use tracing::{error, trace, warn};

use super::connection::Connection;

/// Drain the outbound queue and emit pings at `ping_interval` until a write
/// fails, a write exceeds `write_timeout`, or the connection is closed.
///
/// Closes the connection on exit, which stops the read loop too.
pub(crate) async fn run_write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<ResponseMessage>,
    conn: Arc<Connection>,
    ping_interval: Duration,
    write_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(ping_interval);
    let _ = ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            () = conn.cancelled() => {
                // Responses enqueued before teardown (fatal-error replies
                // from the read loop) must still reach the peer ahead of
                // the close frame.
                while let Ok(message) = outbound.try_recv() {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(conn_id = %conn.id, error = %e, "failed to serialize response");
                            continue;
                        }
                    };
                    match tokio::time::timeout(write_timeout, sink.send(Message::Text(text.into()))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(conn_id = %conn.id, error = %e, "flush write failed");
                            break;
                        }
                        Err(_elapsed) => {
                            warn!(conn_id = %conn.id, "write deadline exceeded on flush");
                            break;
                        }
                    }
                }
                let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
                break;
            }
            _ = ticker.tick() => {
                match tokio::time::timeout(write_timeout, sink.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => trace!(conn_id = %conn.id, "liveness probe sent"),
                    Ok(Err(e)) => {
                        warn!(conn_id = %conn.id, error = %e, "ping write failed");
                        break;
                    }
                    Err(_elapsed) => {
                        warn!(conn_id = %conn.id, "write deadline exceeded on ping");
                        break;
                    }
                }
            }
            message = outbound.recv() => {
                let Some(message) = message else {
                    // Queue drained and closed: say goodbye.
                    let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
                    break;
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(conn_id = %conn.id, error = %e, "failed to serialize response");
                        continue;
                    }
                };
                match tokio::time::timeout(write_timeout, sink.send(Message::Text(text.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(conn_id = %conn.id, error = %e, "response write failed");
                        break;
                    }
                    Err(_elapsed) => {
                        warn!(conn_id = %conn.id, "write deadline exceeded on response");
                        break;
                    }
                }
            }
        }
    }
    conn.close();
}
