//! Request envelope.

use serde::{Deserialize, Serialize};

/// Request envelope.
///
/// Every operation arrives as a single JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version; must equal [`crate::PROTOCOL_VERSION`].
    pub protocol_version: i32,
    /// Caller-chosen request ID, echoed back for correlation.
    pub request_id: String,
    /// Operation name (see [`crate::ops::names`]).
    pub op: String,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Request {
    /// Build a request with the current protocol version.
    pub fn new(request_id: impl Into<String>, op: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            request_id: request_id.into(),
            op: op.into(),
            payload,
        }
    }
}
