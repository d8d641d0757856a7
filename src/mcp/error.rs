//! Protocol-level error taxonomy and its JSON-RPC mapping.

use serde_json::{json, Value};

use crate::models::{RpcError, Violation};
use crate::upstream::UpstreamError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const UNKNOWN_TOOL: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const TOOL_EXECUTION_ERROR: i64 = -32000;
pub const UPSTREAM_ERROR: i64 = -32001;
pub const UPSTREAM_TIMEOUT: i64 = -32002;

/// Every way a tool invocation can fail.
///
/// Only the two malformed-request variants become non-2xx HTTP replies; the
/// rest travel inside a 200 error envelope.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum McpError {
    /// The request body is not JSON
    #[error("Parse error: {0}")]
    MalformedBody(String),

    /// The body is JSON but not a valid envelope
    #[error("Invalid request: {0}")]
    MalformedEnvelope(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters: {}", join_violations(.0))]
    InvalidParameters(Vec<Violation>),

    /// Non-2xx reply, or no usable reply at all (`status` is then `None`)
    #[error("Upstream error: {detail}")]
    Upstream { status: Option<u16>, detail: String },

    #[error("Upstream request timed out after {0}s")]
    UpstreamTimeout(u64),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl McpError {
    /// JSON-RPC error code
    pub fn code(&self) -> i64 {
        match self {
            McpError::MalformedBody(_) => PARSE_ERROR,
            McpError::MalformedEnvelope(_) => INVALID_REQUEST,
            McpError::UnknownTool(_) => UNKNOWN_TOOL,
            McpError::InvalidParameters(_) => INVALID_PARAMS,
            McpError::Upstream { .. } => UPSTREAM_ERROR,
            McpError::UpstreamTimeout(_) => UPSTREAM_TIMEOUT,
            McpError::ToolExecution(_) => TOOL_EXECUTION_ERROR,
        }
    }

    /// Whether the envelope itself could not be understood
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            McpError::MalformedBody(_) | McpError::MalformedEnvelope(_)
        )
    }

    /// HTTP status for a reply carrying this error
    pub fn http_status(&self) -> http::StatusCode {
        if self.is_malformed() {
            http::StatusCode::BAD_REQUEST
        } else {
            http::StatusCode::OK
        }
    }

    /// Structured detail for the envelope's `data` field
    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::UnknownTool(tool) => Some(json!({ "tool": tool })),
            McpError::InvalidParameters(violations) => {
                let missing: Vec<&str> = violations
                    .iter()
                    .filter_map(|v| match v {
                        Violation::Missing { parameter } => Some(parameter.as_str()),
                        _ => None,
                    })
                    .collect();
                Some(json!({ "violations": violations, "missing": missing }))
            }
            McpError::Upstream { status, detail } => {
                Some(json!({ "status": status, "detail": detail }))
            }
            McpError::UpstreamTimeout(secs) => Some(json!({ "timeout_secs": secs })),
            McpError::MalformedBody(_)
            | McpError::MalformedEnvelope(_)
            | McpError::ToolExecution(_) => None,
        }
    }

    pub fn to_rpc_error(&self) -> RpcError {
        RpcError {
            code: self.code(),
            message: self.to_string(),
            data: self.data(),
        }
    }
}

impl From<UpstreamError> for McpError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, detail } => McpError::Upstream {
                status: Some(status),
                detail,
            },
            UpstreamError::Timeout(timeout) => McpError::UpstreamTimeout(timeout.as_secs()),
            other @ (UpstreamError::Network(_) | UpstreamError::Parse(_)) => McpError::Upstream {
                status: None,
                detail: other.to_string(),
            },
        }
    }
}
