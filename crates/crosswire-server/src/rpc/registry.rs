//! Channel registry: method name → handler, populated at startup.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use crosswire_rpc::message::RequestMessage;

use crate::websocket::connection::Connection;

/// Trait implemented by every channel handler.
///
/// Handlers run as independent tasks; their only way back to the client is
/// [`Connection::send`]. A handler that panics takes down its own task and
/// nothing else.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Handle one dispatched request.
    async fn handle(&self, request: RequestMessage, conn: Arc<Connection>);
}

// Plain async functions and closures are handlers too, so registration
// reads like `registry.register("echo", |req, conn| async move { .. })`.
#[async_trait]
impl<F, Fut> ChannelHandler for F
where
    F: Fn(RequestMessage, Arc<Connection>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn handle(&self, request: RequestMessage, conn: Arc<Connection>) {
        self(request, conn).await;
    }
}

/// Rejected registration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The channel name was empty.
    #[error("channel can not be an empty string")]
    EmptyChannel,
    /// A handler is already registered under this name.
    #[error("channel '{0}' already registered")]
    DuplicateChannel(String),
}

/// Registry mapping channel names to handlers.
///
/// Populated with `&mut self` during process setup, then moved behind an
/// `Arc` into the server; lookups after that point need no locking because
/// nothing can mutate the map anymore.
#[derive(Default)]
pub struct ChannelRegistry {
    handlers: HashMap<String, Arc<dyn ChannelHandler>>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a channel name.
    ///
    /// Fails for an empty name or a name that already has a handler; the
    /// existing handler is left untouched in the duplicate case.
    pub fn register(
        &mut self,
        channel: &str,
        handler: impl ChannelHandler + 'static,
    ) -> Result<(), RegistryError> {
        self.register_arc(channel, Arc::new(handler))
    }

    /// Register an already-boxed handler (e.g. a middleware-wrapped one).
    pub fn register_arc(
        &mut self,
        channel: &str,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), RegistryError> {
        if channel.is_empty() {
            return Err(RegistryError::EmptyChannel);
        }
        if self.handlers.contains_key(channel) {
            return Err(RegistryError::DuplicateChannel(channel.to_owned()));
        }
        let _ = self.handlers.insert(channel.to_owned(), handler);
        Ok(())
    }

    /// Look up the handler for a channel.
    pub fn resolve(&self, channel: &str) -> Option<Arc<dyn ChannelHandler>> {
        self.handlers.get(channel).cloned()
    }

    /// Whether a channel is registered.
    pub fn has_channel(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    /// All registered channel names (sorted).
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
