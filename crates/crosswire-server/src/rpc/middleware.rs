//! Middleware composition around channel handlers.

use std::sync::Arc;

use async_trait::async_trait;
use crosswire_rpc::message::{RequestMessage, ResponseMessage};

use crate::rpc::registry::ChannelHandler;
use crate::websocket::connection::Connection;

/// An interceptor invoked before the handler.
///
/// Returning `Some(response)` short-circuits dispatch: the response is sent
/// and the handler never runs. Returning `None` falls through to the next
/// interceptor and finally the handler.
pub type Middleware =
    Arc<dyn Fn(&RequestMessage, &Arc<Connection>) -> Option<ResponseMessage> + Send + Sync>;

/// Compose `middlewares` around `handler`, in order.
///
/// Pure composition, built once at registration time; the wrapped handler
/// is registered in place of the original.
pub fn wrap(handler: Arc<dyn ChannelHandler>, middlewares: Vec<Middleware>) -> Arc<dyn ChannelHandler> {
    if middlewares.is_empty() {
        return handler;
    }
    Arc::new(WrappedHandler {
        inner: handler,
        middlewares,
    })
}

struct WrappedHandler {
    inner: Arc<dyn ChannelHandler>,
    middlewares: Vec<Middleware>,
}

#[async_trait]
impl ChannelHandler for WrappedHandler {
    async fn handle(&self, request: RequestMessage, conn: Arc<Connection>) {
        for middleware in &self.middlewares {
            if let Some(response) = middleware(&request, &conn) {
                let _ = conn.send(response);
                return;
            }
        }
        self.inner.handle(request, conn).await;
    }
}
