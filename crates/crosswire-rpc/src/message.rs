//! Wire-format envelope types for requests, responses, and errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version tag attached to every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Literal liveness probe payload, answered without JSON decoding.
pub const PING: &str = "PING";

/// Literal liveness reply.
pub const PONG: &str = "PONG";

/// Incoming request envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Protocol version tag.
    #[serde(default)]
    pub jsonrpc: String,
    /// Channel name (e.g. `echo` or `ticker.subscribe`).
    pub method: String,
    /// Correlation identifier. Requests without one are rejected before
    /// dispatch; the protocol requires correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Opaque parameters, passed through to the handler untouched.
    #[serde(default)]
    pub params: Value,
}

impl RequestMessage {
    /// Build a request with the current protocol version.
    pub fn new(method: impl Into<String>, id: Option<u64>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            id,
            params,
        }
    }
}

/// Outgoing response envelope.
///
/// `result` and `error` are mutually exclusive in a well-formed response.
/// The `id` and `jsonrpc` fields are stamped by the connection at send
/// time, not by the caller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Protocol version tag.
    #[serde(default)]
    pub jsonrpc: String,
    /// Correlation identifier of the request being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Channel name, for server-initiated notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Result payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Notification parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Microseconds-since-epoch when the request entered the handler.
    #[serde(rename = "usIn", default, skip_serializing_if = "Option::is_none")]
    pub us_in: Option<u64>,
    /// Microseconds-since-epoch when the response was enqueued.
    #[serde(rename = "usOut", default, skip_serializing_if = "Option::is_none")]
    pub us_out: Option<u64>,
    /// Handler latency in microseconds (`usOut - usIn`).
    #[serde(rename = "usDiff", default, skip_serializing_if = "Option::is_none")]
    pub us_diff: Option<u64>,
    /// Error payload on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

impl ResponseMessage {
    /// Build a success response carrying `result`.
    pub fn result(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    /// Build a failure response carrying `error`.
    pub fn from_error(error: ErrorMessage) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Record the handler entry timestamp; the connection fills `usOut`
    /// and `usDiff` when the response is enqueued.
    #[must_use]
    pub fn with_us_in(mut self, us_in: u64) -> Self {
        self.us_in = Some(us_in);
        self
    }
}

/// Error payload inside a [`ResponseMessage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable message.
    pub message: String,
    /// Numeric code from the fixed taxonomy in [`crate::errors`].
    pub code: i64,
    /// Optional structured reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ReasonMessage>,
}

impl ErrorMessage {
    /// Build an error with the given code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            data: None,
        }
    }

    /// Attach a structured reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.data = Some(ReasonMessage {
            reason: reason.into(),
        });
        self
    }
}

/// Structured reason attached to an [`ErrorMessage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonMessage {
    /// Machine-usable explanation of the failure.
    pub reason: String,
}

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_micros() -> u64 {
    chrono::Utc::now().timestamp_micros().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── RequestMessage ──────────────────────────────────────────────

    #[test]
    fn request_roundtrip() {
        let req = RequestMessage::new("echo", Some(7), json!("hi"));
        let text = serde_json::to_string(&req).unwrap();
        let back: RequestMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back.jsonrpc, "2.0");
        assert_eq!(back.method, "echo");
        assert_eq!(back.id, Some(7));
        assert_eq!(back.params, json!("hi"));
    }

    #[test]
    fn request_without_id_parses() {
        let req: RequestMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"echo","params":null}"#).unwrap();
        assert!(req.id.is_none());
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn request_missing_method_fails() {
        let parsed = serde_json::from_str::<RequestMessage>(r#"{"id":1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn request_missing_params_defaults_null() {
        let req: RequestMessage = serde_json::from_str(r#"{"method":"m","id":2}"#).unwrap();
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn request_id_omitted_when_none() {
        let req = RequestMessage::new("m", None, Value::Null);
        let text = serde_json::to_string(&req).unwrap();
        assert!(!text.contains("\"id\""));
    }

    // ── ResponseMessage ─────────────────────────────────────────────

    #[test]
    fn response_result_serde() {
        let resp = ResponseMessage::result(json!({"ok": true}));
        let text = serde_json::to_string(&resp).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["result"]["ok"], true);
        assert!(v.get("error").is_none());
        assert!(v.get("id").is_none());
    }

    #[test]
    fn response_error_serde() {
        let resp = ResponseMessage::from_error(ErrorMessage::new(-32601, "method not found"));
        let text = serde_json::to_string(&resp).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["error"]["code"], -32601);
        assert_eq!(v["error"]["message"], "method not found");
        assert!(v.get("result").is_none());
    }

    #[test]
    fn response_result_and_error_exclusive_by_construction() {
        let ok = ResponseMessage::result(json!(1));
        assert!(ok.error.is_none());
        let err = ResponseMessage::from_error(ErrorMessage::new(-32603, "boom"));
        assert!(err.result.is_none());
    }

    #[test]
    fn timing_fields_use_camel_case() {
        let resp = ResponseMessage {
            us_in: Some(1),
            us_out: Some(3),
            us_diff: Some(2),
            ..ResponseMessage::default()
        };
        let text = serde_json::to_string(&resp).unwrap();
        assert!(text.contains("\"usIn\":1"));
        assert!(text.contains("\"usOut\":3"));
        assert!(text.contains("\"usDiff\":2"));
    }

    #[test]
    fn timing_fields_omitted_when_absent() {
        let text = serde_json::to_string(&ResponseMessage::result(json!(0))).unwrap();
        assert!(!text.contains("usIn"));
        assert!(!text.contains("usOut"));
        assert!(!text.contains("usDiff"));
    }

    #[test]
    fn with_us_in_sets_entry_timestamp() {
        let resp = ResponseMessage::result(json!(0)).with_us_in(123);
        assert_eq!(resp.us_in, Some(123));
        assert!(resp.us_out.is_none());
    }

    #[test]
    fn response_roundtrip() {
        let resp = ResponseMessage {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(9),
            result: Some(json!("PONG")),
            ..ResponseMessage::default()
        };
        let text = serde_json::to_string(&resp).unwrap();
        let back: ResponseMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back.id, Some(9));
        assert_eq!(back.result, Some(json!("PONG")));
        assert!(back.error.is_none());
    }

    // ── ErrorMessage ────────────────────────────────────────────────

    #[test]
    fn error_with_reason_serde() {
        let err = ErrorMessage::new(-32000, "rejected").with_reason("rate limited");
        let text = serde_json::to_string(&err).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["data"]["reason"], "rate limited");
    }

    #[test]
    fn error_data_omitted_when_absent() {
        let text = serde_json::to_string(&ErrorMessage::new(-32700, "bad json")).unwrap();
        assert!(!text.contains("data"));
    }

    // ── now_micros ──────────────────────────────────────────────────

    #[test]
    fn now_micros_is_monotonic_enough() {
        let a = now_micros();
        let b = now_micros();
        assert!(b >= a);
        // Sanity: after 2020-01-01 in microseconds.
        assert!(a > 1_577_836_800_000_000);
    }
}
