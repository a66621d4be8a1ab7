//! # crosswire-rpc
//!
//! Wire envelope and error taxonomy for the Crosswire WebSocket JSON-RPC
//! protocol.
//!
//! - Request/response/error envelope types (`message`)
//! - Numeric JSON-RPC error codes and error constructors (`errors`)
//!
//! Pure data contracts: no I/O, no behavior beyond construction helpers.

#![deny(unsafe_code)]

pub mod errors;
pub mod message;

pub use errors::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR,
};
pub use message::{
    now_micros, ErrorMessage, ReasonMessage, RequestMessage, ResponseMessage, JSONRPC_VERSION,
    PING, PONG,
};
