//! Error types for the gateway protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned in error responses.
///
/// These codes are stable and intended for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed JSON, missing required fields, or invalid field values.
    InvalidRequest,
    /// Protocol version does not match the supported version.
    UnsupportedProtocol,
    /// Unknown operation requested.
    UnknownOperation,
    /// No configured tool with the requested name.
    UnknownTool,
    /// Task not found.
    TaskNotFound,
    /// An async task of this tool is already pending or running.
    TaskAlreadyActive,
    /// The task store is full and every tracked task is still active.
    TaskCapacity,
    /// A file operation tried to escape the scratch root.
    SandboxViolation,
    /// No configured resource with the requested URI.
    ResourceNotFound,
    /// Command execution failed (non-zero exit, timeout, or spawn error).
    ExecFailed,
    /// Scratch-space operations require a configured scratch directory.
    ScratchDisabled,
    /// A unified-diff patch could not be parsed or applied.
    PatchFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::UnsupportedProtocol => write!(f, "UNSUPPORTED_PROTOCOL"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
            Self::UnknownTool => write!(f, "UNKNOWN_TOOL"),
            Self::TaskNotFound => write!(f, "TASK_NOT_FOUND"),
            Self::TaskAlreadyActive => write!(f, "TASK_ALREADY_ACTIVE"),
            Self::TaskCapacity => write!(f, "TASK_CAPACITY"),
            Self::SandboxViolation => write!(f, "SANDBOX_VIOLATION"),
            Self::ResourceNotFound => write!(f, "RESOURCE_NOT_FOUND"),
            Self::ExecFailed => write!(f, "EXEC_FAILED"),
            Self::ScratchDisabled => write!(f, "SCRATCH_DISABLED"),
            Self::PatchFailed => write!(f, "PATCH_FAILED"),
        }
    }
}

/// Error payload carried inside an error response.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct GateError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl GateError {
    /// Create a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create an UNSUPPORTED_PROTOCOL error.
    pub fn unsupported_protocol(requested: i32, supported: i32) -> Self {
        Self::with_data(
            ErrorCode::UnsupportedProtocol,
            format!("protocol_version {} is not supported (expected {})", requested, supported),
            serde_json::json!({ "requested": requested, "supported": supported }),
        )
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }

    /// Create an UNKNOWN_TOOL error.
    pub fn unknown_tool(tool: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownTool,
            format!("no configured tool named '{}'", tool),
            serde_json::json!({ "tool": tool }),
        )
    }

    /// Create a TASK_NOT_FOUND error.
    pub fn task_not_found(task_id: &str) -> Self {
        Self::with_data(
            ErrorCode::TaskNotFound,
            format!("no task found with ID: {}", task_id),
            serde_json::json!({ "task_id": task_id }),
        )
    }

    /// Create a TASK_ALREADY_ACTIVE admission error.
    pub fn task_already_active(tool: &str) -> Self {
        Self::with_data(
            ErrorCode::TaskAlreadyActive,
            format!(
                "task '{}' is already in progress; call 'list_tasks' or 'task_status' to monitor it",
                tool
            ),
            serde_json::json!({ "tool": tool }),
        )
    }

    /// Create a RESOURCE_NOT_FOUND error.
    pub fn resource_not_found(uri: &str) -> Self {
        Self::with_data(
            ErrorCode::ResourceNotFound,
            format!("resource not found: {}; call 'list_resources' to see available URIs", uri),
            serde_json::json!({ "uri": uri }),
        )
    }

    /// Create a SCRATCH_DISABLED error.
    pub fn scratch_disabled() -> Self {
        Self::new(
            ErrorCode::ScratchDisabled,
            "scratch space is not configured; start the gateway with a scratch directory",
        )
    }
}
