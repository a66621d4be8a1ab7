//! JSON-RPC error codes and error constructors.

use crate::message::ErrorMessage;

// ── Error code constants ────────────────────────────────────────────

/// Invalid JSON was received; the payload could not be parsed.
pub const PARSE_ERROR: i64 = -32700;
/// The payload is not a valid request object (e.g. missing id).
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist / is not registered.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;
/// Start of the implementation-defined server error range.
pub const SERVER_ERROR: i64 = -32000;
/// End (inclusive) of the implementation-defined server error range.
pub const SERVER_ERROR_MIN: i64 = -32099;

// ── Constructors ────────────────────────────────────────────────────

/// Parse error (-32700).
pub fn parse_error(message: impl Into<String>) -> ErrorMessage {
    ErrorMessage::new(PARSE_ERROR, message)
}

/// Invalid request (-32600).
pub fn invalid_request(message: impl Into<String>) -> ErrorMessage {
    ErrorMessage::new(INVALID_REQUEST, message)
}

/// Method not found (-32601).
pub fn method_not_found(message: impl Into<String>) -> ErrorMessage {
    ErrorMessage::new(METHOD_NOT_FOUND, message)
}

/// Invalid params (-32602).
pub fn invalid_params(message: impl Into<String>) -> ErrorMessage {
    ErrorMessage::new(INVALID_PARAMS, message)
}

/// Internal error (-32603).
pub fn internal_error(message: impl Into<String>) -> ErrorMessage {
    ErrorMessage::new(INTERNAL_ERROR, message)
}

/// Whether `code` falls in the reserved server error range.
pub fn is_server_error(code: i64) -> bool {
    (SERVER_ERROR_MIN..=SERVER_ERROR).contains(&code)
}
