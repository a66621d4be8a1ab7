//! Read loop: await frame, decode, route, dispatch.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use crosswire_rpc::errors;
use crosswire_rpc::message::{RequestMessage, ResponseMessage, PING, PONG};
use futures::stream::SplitStream;
use futures::StreamExt;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use super::connection::Connection;
use crate::rpc::registry::ChannelRegistry;

/// Consume inbound frames until the transport fails, the peer goes silent
/// past `pong_timeout`, or the connection is closed from elsewhere.
///
/// Every received frame (pongs included) refreshes the liveness deadline.
/// Closes the connection on exit, which stops the write loop too.
pub(crate) async fn run_read_loop(
    mut stream: SplitStream<WebSocket>,
    conn: Arc<Connection>,
    registry: Arc<ChannelRegistry>,
    pong_timeout: Duration,
) {
    loop {
        let frame = tokio::select! {
            () = conn.cancelled() => break,
            next = tokio::time::timeout(pong_timeout, stream.next()) => match next {
                Err(_elapsed) => {
                    warn!(conn_id = %conn.id, "peer silent past liveness timeout");
                    let _ = conn.send(ResponseMessage::from_error(errors::invalid_request(
                        "error reading message",
                    )));
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    warn!(conn_id = %conn.id, error = %e, "transport read failed");
                    let _ = conn.send(ResponseMessage::from_error(errors::invalid_request(
                        "error reading message",
                    )));
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            },
        };

        match frame {
            Message::Text(payload) => {
                if !route_text(payload.as_str(), &conn, &registry) {
                    break;
                }
            }
            // Any inbound frame proves the peer is alive; pings are
            // answered by axum itself.
            Message::Pong(_) | Message::Ping(_) => {}
            Message::Close(_) => break,
            Message::Binary(_) => {
                warn!(conn_id = %conn.id, "non-text frame rejected");
                let _ = conn.send(ResponseMessage::from_error(errors::invalid_request(
                    "invalid message type",
                )));
                break;
            }
        }
    }
    conn.close();
}

/// Route one text payload. Returns `false` when the failure is fatal and
/// the loop must terminate.
pub(crate) fn route_text(
    payload: &str,
    conn: &Arc<Connection>,
    registry: &Arc<ChannelRegistry>,
) -> bool {
    // Liveness sentinel bypasses the JSON envelope entirely.
    if payload == PING {
        let _ = conn.send(ResponseMessage::result(Value::String(PONG.into())));
        return true;
    }

    let request: RequestMessage = match serde_json::from_str(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(conn_id = %conn.id, error = %e, "malformed request payload");
            counter!("rpc_errors_total", "error_type" => "parse_error").increment(1);
            let _ = conn.send(ResponseMessage::from_error(errors::parse_error(
                "error reading message",
            )));
            return false;
        }
    };

    counter!("rpc_requests_total", "method" => request.method.clone()).increment(1);

    let Some(handler) = registry.resolve(&request.method) else {
        counter!("rpc_errors_total", "error_type" => "method_not_found").increment(1);
        let _ = conn.send(ResponseMessage::from_error(errors::method_not_found(
            "method not found",
        )));
        return true;
    };

    let Some(id) = request.id else {
        counter!("rpc_errors_total", "error_type" => "missing_id").increment(1);
        let _ = conn.send(ResponseMessage::from_error(errors::invalid_request(
            "id should not be empty",
        )));
        return true;
    };

    conn.note_dispatch(id);
    debug!(conn_id = %conn.id, method = %request.method, id, "dispatching request");

    // Fire and forget: the task's only way back is the outbound queue, and
    // a panic inside it is contained by the task boundary.
    let conn = Arc::clone(conn);
    drop(tokio::spawn(async move {
        handler.handle(request, conn).await;
    }));
    true
}
