//! # crosswire-server
//!
//! WebSocket gateway for the Crosswire JSON-RPC protocol.
//!
//! - Axum `/ws` upgrade endpoint; one `Connection` per socket
//! - Per-connection read loop (decode, route, dispatch) and write loop
//!   (outbound drain + ping keepalive); single-writer discipline
//! - `ChannelRegistry` mapping channel names to handlers, populated at
//!   startup and read-only thereafter
//! - Middleware composition around handlers (short-circuit dispatch)
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use rpc::middleware::{wrap, Middleware};
pub use rpc::registry::{ChannelHandler, ChannelRegistry, RegistryError};
pub use server::{GatewayServer, ServerHandle};
pub use websocket::connection::Connection;
