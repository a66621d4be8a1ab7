//! WebSocket connection lifecycle: per-connection state, read loop, and
//! write loop.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Per-session state: outbound queue, last request id, idempotent close |
//! | `reader` | Inbound frames → decode → route → fire-and-forget dispatch |
//! | `writer` | Outbound drain + ping keepalive; sole writer of the transport |

pub mod connection;
mod reader;
mod writer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures::StreamExt;
use metrics::{counter, gauge};
use tracing::info;

pub use connection::Connection;

use crate::config::ServerConfig;
use crate::rpc::registry::ChannelRegistry;

/// Hook invoked with each freshly established connection, before the loops
/// start; the place to call [`Connection::on_close`].
pub type ConnectHook = dyn Fn(Arc<Connection>) + Send + Sync;

/// Run one WebSocket session to completion.
///
/// Splits the socket, spawns the read and write loops, and tears the whole
/// session down as soon as either loop finishes. The connection close (and
/// its callback) happens exactly once regardless of which side wins.
pub(crate) async fn serve_socket(
    socket: WebSocket,
    registry: Arc<ChannelRegistry>,
    config: ServerConfig,
    on_connect: Option<Arc<ConnectHook>>,
    active: Arc<AtomicUsize>,
) {
    let (sink, stream) = socket.split();
    let (conn, outbound_rx) = Connection::new();

    let _ = active.fetch_add(1, Ordering::Relaxed);
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);
    info!(conn_id = %conn.id, "connection established");

    if let Some(hook) = &on_connect {
        hook(Arc::clone(&conn));
    }

    let mut writer = tokio::spawn(writer::run_write_loop(
        sink,
        outbound_rx,
        Arc::clone(&conn),
        config.ping_interval(),
        config.write_timeout(),
    ));
    let mut reader = tokio::spawn(reader::run_read_loop(
        stream,
        Arc::clone(&conn),
        registry,
        config.pong_timeout(),
    ));

    // Whichever loop exits first, closing the connection cancels the
    // other; then drain it so the socket halves are dropped before the
    // disconnect is recorded.
    tokio::select! {
        _ = &mut writer => {
            conn.close();
            let _ = reader.await;
        }
        _ = &mut reader => {
            conn.close();
            let _ = writer.await;
        }
    }

    let _ = active.fetch_sub(1, Ordering::Relaxed);
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    info!(conn_id = %conn.id, "connection closed");
}
