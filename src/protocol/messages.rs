//! Wire message types
//!
//! Every line on the pipe is exactly one JSON object. Outgoing requests are
//! built from a [`RequestEnvelope`]; incoming lines are classified into a
//! [`WireMessage`] - a response when a non-empty id is present, a
//! notification otherwise. Representing this as a tagged union makes the
//! demultiplexing loop exhaustive and compiler-checked.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::identifiers::RequestId;

/// Protocol version string sent on every request
pub const JSONRPC_VERSION: &str = "2.0";

/// One outgoing request before serialization
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// Wire id, unique within the owning transport instance
    pub request_id: RequestId,
    /// Method name (e.g. `session/prompt`)
    pub method: String,
    /// Request parameters
    pub params: Value,
}

impl RequestEnvelope {
    /// Create an envelope
    pub fn new(request_id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            request_id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to one newline-terminated wire line
    ///
    /// # Errors
    /// Returns error if JSON serialization fails
    pub fn to_line(&self) -> crate::error::Result<String> {
        let value = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": self.request_id.as_str(),
            "method": self.method,
            "params": self.params,
        });
        Ok(format!("{}\n", serde_json::to_string(&value)?))
    }
}

/// JSON-RPC error object carried in an error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    /// Numeric error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Optional structured error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A correlated response from the provider
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// Id of the request this responds to
    pub id: RequestId,
    /// Result payload on success
    pub result: Option<Value>,
    /// Error payload on failure
    pub error: Option<WireError>,
}

impl WireResponse {
    /// Whether this response carries an error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// An uncorrelated notification from the provider
#[derive(Debug, Clone)]
pub struct WireNotification {
    /// Notification method
    pub method: String,
    /// Notification parameters
    pub params: Value,
}

/// One classified incoming wire message
///
/// The discriminant is "has a non-empty id": responses correlate to a
/// request, notifications do not.
#[derive(Debug, Clone)]
pub enum WireMessage {
    /// A response to a previously sent request
    Response(WireResponse),
    /// A provider-initiated notification
    Notification(WireNotification),
}

impl WireMessage {
    /// Classify one parsed line into a response or notification
    ///
    /// Returns `None` for shapes that are neither (no id and no method);
    /// callers treat those as protocol anomalies, never as fatal errors.
    #[must_use]
    pub fn classify(value: Value) -> Option<Self> {
        let obj = value.as_object()?;

        if let Some(id) = wire_id(obj.get("id")) {
            let error = obj
                .get("error")
                .cloned()
                .and_then(|e| serde_json::from_value::<WireError>(e).ok());
            let result = obj.get("result").cloned();
            return Some(Self::Response(WireResponse {
                id: RequestId::new(id),
                result,
                error,
            }));
        }

        let method = obj.get("method")?.as_str()?.to_string();
        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        Some(Self::Notification(WireNotification { method, params }))
    }
}

/// Extract a non-empty wire id, accepting string or integer spellings
fn wire_id(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
