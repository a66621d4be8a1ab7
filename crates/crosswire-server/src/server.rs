//! `GatewayServer` — axum HTTP entry point with the `/ws` upgrade route.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::rpc::registry::ChannelRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{self, ConnectHook, Connection};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Channel registry, read-only once the server is built.
    pub registry: Arc<ChannelRegistry>,
    /// Gateway configuration.
    pub config: ServerConfig,
    /// When the gateway started.
    pub start_time: Instant,
    /// Live connection count.
    pub active: Arc<AtomicUsize>,
    /// Optional per-connection setup hook.
    on_connect: Option<Arc<ConnectHook>>,
}

/// The Crosswire gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    registry: Arc<ChannelRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    active: Arc<AtomicUsize>,
    on_connect: Option<Arc<ConnectHook>>,
}

impl GatewayServer {
    /// Create a gateway around a fully populated registry.
    ///
    /// The registry is frozen here: it moves behind an `Arc` and no further
    /// registration is possible.
    pub fn new(config: ServerConfig, registry: ChannelRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            active: Arc::new(AtomicUsize::new(0)),
            on_connect: None,
        }
    }

    /// Install a hook invoked with each new [`Connection`] before its loops
    /// start — the place to register close callbacks or stash the
    /// connection elsewhere.
    pub fn on_connect(&mut self, hook: impl Fn(Arc<Connection>) + Send + Sync + 'static) {
        self.on_connect = Some(Arc::new(hook));
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            start_time: self.start_time,
            active: Arc::clone(&self.active),
            on_connect: self.on_connect.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }

    /// Bind and serve until shutdown. Port `0` auto-assigns; the bound port
    /// is on the returned handle.
    pub async fn serve(&self) -> std::io::Result<ServerHandle> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let port = listener.local_addr()?.port();
        let router = self.router();
        let token = self.shutdown.token();

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
        });
        info!(port, "gateway listening");

        Ok(ServerHandle {
            port,
            _server: server,
        })
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the channel registry.
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Get the gateway configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// Handle returned by [`GatewayServer::serve`] — keeps the accept loop
/// alive.
pub struct ServerHandle {
    /// The bound port.
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

/// GET /ws — WebSocket upgrade.
///
/// A request that cannot be upgraded is answered with HTTP 500 and the
/// rejection text.
async fn ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(error = %rejection, "websocket upgrade failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, rejection.to_string()).into_response();
        }
    };

    upgrade
        .max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            websocket::serve_socket(
                socket,
                state.registry,
                state.config,
                state.on_connect,
                state.active,
            )
        })
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.active.load(Ordering::Relaxed),
    ))
}
