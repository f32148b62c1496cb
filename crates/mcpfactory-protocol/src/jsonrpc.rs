//! JSON-RPC 2.0 envelope types
//!
//! Every line exchanged over the harness transport is one of the four
//! message shapes defined here, serialized as newline-delimited JSON.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only `jsonrpc` version marker accepted on the wire.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Identifier correlating a request with its response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier (what the harness client generates)
    Number(i64),
    /// String identifier
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

fn version() -> String {
    JSONRPC_VERSION.to_string()
}

/// A request expecting a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Version marker, always `"2.0"`
    #[serde(default = "version")]
    pub jsonrpc: String,

    /// Correlation identifier
    pub id: RequestId,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: version(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A one-way message; never answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Version marker, always `"2.0"`
    #[serde(default = "version")]
    pub jsonrpc: String,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: version(),
            method: method.into(),
            params,
        }
    }
}

/// A successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Version marker, always `"2.0"`
    #[serde(default = "version")]
    pub jsonrpc: String,

    /// Identifier of the request being answered
    pub id: RequestId,

    /// Method result
    pub result: Value,
}

impl JsonRpcResponse {
    /// Create a new successful response
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result,
        }
    }
}

/// Error object carried by an error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code (see [`error_codes`])
    pub code: i64,

    /// Short description
    pub message: String,

    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create an error object without data
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A failed response
///
/// `id` is `None` when the failing request could not be parsed far enough to
/// recover its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    /// Version marker, always `"2.0"`
    #[serde(default = "version")]
    pub jsonrpc: String,

    /// Identifier of the request being answered
    pub id: Option<RequestId>,

    /// Error detail
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    /// Create a new error response
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: version(),
            id,
            error,
        }
    }
}

/// Any JSON-RPC 2.0 message
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    /// Request (expects a response)
    Request(JsonRpcRequest),
    /// Notification (one-way)
    Notification(JsonRpcNotification),
    /// Successful response
    Response(JsonRpcResponse),
    /// Error response
    Error(JsonRpcErrorResponse),
}

impl JsonRpcMessage {
    /// Classify and decode a JSON value
    ///
    /// Messages carrying `method` are requests (with `id`) or notifications
    /// (without); otherwise `error` marks an error response and `result` a
    /// successful one.
    pub fn from_value(value: Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::InvalidMessage("expected a JSON object".to_string()))?;

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            Some(other) => {
                return Err(ProtocolError::VersionMismatch {
                    expected: JSONRPC_VERSION.to_string(),
                    got: other.to_string(),
                });
            }
            None => return Err(ProtocolError::MissingField("jsonrpc".to_string())),
        }

        let has_id = object.get("id").is_some_and(|id| !id.is_null());
        if object.contains_key("method") {
            if has_id {
                Ok(Self::Request(serde_json::from_value(value)?))
            } else {
                Ok(Self::Notification(serde_json::from_value(value)?))
            }
        } else if object.contains_key("error") {
            Ok(Self::Error(serde_json::from_value(value)?))
        } else if object.contains_key("result") {
            Ok(Self::Response(serde_json::from_value(value)?))
        } else {
            Err(ProtocolError::InvalidMessage(
                "message has neither method, result nor error".to_string(),
            ))
        }
    }

    /// Encode as a JSON value
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            Self::Request(m) => serde_json::to_value(m)?,
            Self::Notification(m) => serde_json::to_value(m)?,
            Self::Response(m) => serde_json::to_value(m)?,
            Self::Error(m) => serde_json::to_value(m)?,
        };
        Ok(value)
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }

    /// Deserialize from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(m) => Some(&m.method),
            Self::Notification(m) => Some(&m.method),
            _ => None,
        }
    }

    /// Correlation identifier, if the message has one
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(m) => Some(&m.id),
            Self::Response(m) => Some(&m.id),
            Self::Error(m) => m.id.as_ref(),
            Self::Notification(_) => None,
        }
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Request(m) => m.serialize(serializer),
            Self::Notification(m) => m.serialize(serializer),
            Self::Response(m) => m.serialize(serializer),
            Self::Error(m) => m.serialize(serializer),
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(message: JsonRpcRequest) -> Self {
        Self::Request(message)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(message: JsonRpcNotification) -> Self {
        Self::Notification(message)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(message: JsonRpcResponse) -> Self {
        Self::Response(message)
    }
}

impl From<JsonRpcErrorResponse> for JsonRpcMessage {
    fn from(message: JsonRpcErrorResponse) -> Self {
        Self::Error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}), "request")]
    #[case(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}), "notification")]
    #[case(json!({"jsonrpc": "2.0", "id": null, "method": "odd"}), "notification")]
    #[case(json!({"jsonrpc": "2.0", "id": "a", "result": {}}), "response")]
    #[case(json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "bad"}}), "error")]
    fn test_classification(#[case] value: Value, #[case] expected: &str) {
        let message = JsonRpcMessage::from_value(value).unwrap();
        let kind = match message {
            JsonRpcMessage::Request(_) => "request",
            JsonRpcMessage::Notification(_) => "notification",
            JsonRpcMessage::Response(_) => "response",
            JsonRpcMessage::Error(_) => "error",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn test_rejects_wrong_version() {
        let err = JsonRpcMessage::from_value(json!({"jsonrpc": "1.0", "id": 1, "method": "x"}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::VersionMismatch { .. }));
    }

    #[test]
    fn test_rejects_missing_version() {
        let err = JsonRpcMessage::from_value(json!({"id": 1, "method": "x"})).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("jsonrpc".to_string()));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = JsonRpcMessage::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_request_omits_absent_params() {
        let request = JsonRpcRequest::new(RequestId::Number(7), "tools/list", None);
        let json = JsonRpcMessage::Request(request).to_json().unwrap();
        assert!(!json.contains("params"));
        assert!(json.contains("\"id\":7"));
    }

    #[test]
    fn test_error_response_keeps_null_id() {
        let response = JsonRpcErrorResponse::new(
            None,
            JsonRpcError::new(error_codes::PARSE_ERROR, "Parse error"),
        );
        let value = JsonRpcMessage::Error(response).to_value().unwrap();
        assert!(value["id"].is_null());
        assert_eq!(value["error"]["code"], -32700);
    }

    #[test]
    fn test_serialize_matches_inner_shape() {
        let message: JsonRpcMessage = JsonRpcResponse::new(RequestId::Number(1), json!({})).into();
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": {}})
        );
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::Number(3).to_string(), "3");
        assert_eq!(RequestId::from("abc").to_string(), "abc");
    }
}
