//! Per-connection state shared between the read loop, the write loop,
//! and dispatched handler tasks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crosswire_rpc::message::{now_micros, ResponseMessage, JSONRPC_VERSION};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

type CloseCallback = Box<dyn FnOnce() + Send>;

/// One established WebSocket session.
///
/// The transport's write side is owned exclusively by the write loop; every
/// producer (handler tasks, the read loop's error replies) reaches it only
/// through the outbound queue. Exactly one read loop and one write loop run
/// per connection, and either one finishing tears the whole session down.
pub struct Connection {
    /// Unique connection id (`conn_<uuid7>`).
    pub id: String,
    outbound: mpsc::UnboundedSender<ResponseMessage>,
    /// Identifier of the most recently dispatched request. Zero means no
    /// request has been dispatched yet.
    last_request_id: AtomicU64,
    closed: AtomicBool,
    cancel: CancellationToken,
    close_callback: Mutex<Option<CloseCallback>>,
}

impl Connection {
    /// Create a connection and the receiving half of its outbound queue.
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ResponseMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            id: format!("conn_{}", Uuid::now_v7()),
            outbound: tx,
            last_request_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            close_callback: Mutex::new(None),
        });
        (conn, rx)
    }

    /// Enqueue a response for the write loop.
    ///
    /// Stamps the protocol version and the connection's current request
    /// identifier, and fills `usOut`/`usDiff` when the handler recorded
    /// `usIn`. Returns `false` once the write loop is gone.
    ///
    /// The identifier is whichever request was dispatched most recently on
    /// this connection: with more than one request in flight a response may
    /// be stamped with another request's id. Single-outstanding-request
    /// semantics per connection.
    pub fn send(&self, mut response: ResponseMessage) -> bool {
        response.jsonrpc = JSONRPC_VERSION.to_owned();
        let last = self.last_request_id.load(Ordering::Acquire);
        response.id = (last != 0).then_some(last);
        if let Some(us_in) = response.us_in {
            let us_out = now_micros();
            response.us_out = Some(us_out);
            response.us_diff = Some(us_out.saturating_sub(us_in));
        }
        self.outbound.send(response).is_ok()
    }

    /// Register the teardown callback. At most one is kept; registering
    /// again replaces the previous one.
    pub fn on_close(&self, callback: impl FnOnce() + Send + 'static) {
        *self.close_callback.lock() = Some(Box::new(callback));
    }

    /// Tear the connection down.
    ///
    /// Idempotent: the close callback runs exactly once no matter how many
    /// callers (either loop, or user code) race here. Cancelling the token
    /// stops both loops; the write loop emits a final close frame on its
    /// way out.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(callback) = self.close_callback.lock().take() {
            callback();
        }
        self.cancel.cancel();
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Identifier of the most recently dispatched request, if any.
    pub fn last_request_id(&self) -> Option<u64> {
        let id = self.last_request_id.load(Ordering::Acquire);
        (id != 0).then_some(id)
    }

    /// Record a dispatched request's identifier.
    pub(crate) fn note_dispatch(&self, id: u64) {
        self.last_request_id.store(id, Ordering::Release);
    }

    /// Resolves once the connection is closed.
    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crosswire_rpc::errors;
    use serde_json::json;

    #[tokio::test]
    async fn send_stamps_version_and_omits_zero_id() {
        let (conn, mut rx) = Connection::new();
        assert!(conn.send(ResponseMessage::result(json!("PONG"))));
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.jsonrpc, JSONRPC_VERSION);
        assert!(msg.id.is_none());
    }

    #[tokio::test]
    async fn send_stamps_last_dispatched_id() {
        let (conn, mut rx) = Connection::new();
        conn.note_dispatch(7);
        assert!(conn.send(ResponseMessage::result(json!("hi"))));
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.id, Some(7));
    }

    #[tokio::test]
    async fn send_uses_most_recent_dispatch() {
        let (conn, mut rx) = Connection::new();
        conn.note_dispatch(1);
        conn.note_dispatch(2);
        let _ = conn.send(ResponseMessage::result(json!(null)));
        assert_eq!(rx.recv().await.unwrap().id, Some(2));
    }

    #[tokio::test]
    async fn send_fills_timing_when_us_in_present() {
        let (conn, mut rx) = Connection::new();
        let us_in = now_micros();
        let _ = conn.send(ResponseMessage::result(json!(0)).with_us_in(us_in));
        let msg = rx.recv().await.unwrap();
        let us_out = msg.us_out.unwrap();
        assert!(us_out >= us_in);
        assert_eq!(msg.us_diff, Some(us_out - us_in));
    }

    #[tokio::test]
    async fn send_leaves_timing_absent_otherwise() {
        let (conn, mut rx) = Connection::new();
        let _ = conn.send(ResponseMessage::result(json!(0)));
        let msg = rx.recv().await.unwrap();
        assert!(msg.us_out.is_none());
        assert!(msg.us_diff.is_none());
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_returns_false() {
        let (conn, rx) = Connection::new();
        drop(rx);
        assert!(!conn.send(ResponseMessage::result(json!(0))));
    }

    #[tokio::test]
    async fn send_preserves_error_payload() {
        let (conn, mut rx) = Connection::new();
        let _ = conn.send(ResponseMessage::from_error(errors::method_not_found(
            "method not found",
        )));
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.error.unwrap().code, errors::METHOD_NOT_FOUND);
    }

    #[test]
    fn close_runs_callback_once() {
        let (conn, _rx) = Connection::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        conn.on_close(move || {
            let _ = counted.fetch_add(1, Ordering::SeqCst);
        });
        conn.close();
        conn.close();
        conn.close();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(conn.is_closed());
    }

    #[test]
    fn concurrent_close_runs_callback_once() {
        let (conn, _rx) = Connection::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        conn.on_close(move || {
            let _ = counted.fetch_add(1, Ordering::SeqCst);
        });

        let mut threads = Vec::new();
        for _ in 0..8 {
            let conn = conn.clone();
            threads.push(std::thread::spawn(move || conn.close()));
        }
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_without_callback_is_fine() {
        let (conn, _rx) = Connection::new();
        conn.close();
        assert!(conn.is_closed());
    }

    #[test]
    fn on_close_replaces_previous_callback() {
        let (conn, _rx) = Connection::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let f = first.clone();
        conn.on_close(move || {
            let _ = f.fetch_add(1, Ordering::SeqCst);
        });
        let s = second.clone();
        conn.on_close(move || {
            let _ = s.fetch_add(1, Ordering::SeqCst);
        });
        conn.close();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_cancels_token() {
        let (conn, _rx) = Connection::new();
        conn.close();
        // Resolves immediately once cancelled.
        conn.cancelled().await;
    }

    #[test]
    fn last_request_id_tracks_dispatch() {
        let (conn, _rx) = Connection::new();
        assert!(conn.last_request_id().is_none());
        conn.note_dispatch(42);
        assert_eq!(conn.last_request_id(), Some(42));
    }

    #[test]
    fn connection_ids_are_unique() {
        let (a, _ra) = Connection::new();
        let (b, _rb) = Connection::new();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("conn_"));
    }
}
