//! Response envelope.

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Response envelope.
///
/// Every operation produces a single JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version (echoed from the request).
    pub protocol_version: i32,
    /// Request ID echoed from the request.
    pub request_id: String,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Success payload (present when ok=true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Error details (present when ok=false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GateError>,
}

impl Response {
    /// Create a success response.
    pub fn success(request_id: String, payload: serde_json::Value) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            request_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(request_id: String, error: GateError) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            request_id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Convenience accessor: the success payload rendered as text, when the
    /// payload is a plain JSON string.
    pub fn text(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.as_str())
    }
}
