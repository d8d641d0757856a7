//! JSON-RPC 2.0 envelopes used for tool invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The JSON-RPC version. MUST be "2.0".
pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation id - string or number per JSON-RPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(serde_json::Number),
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => f.write_str(s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Inbound tool invocation envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Protocol version tag; defaults to "2.0" when omitted
    #[serde(default = "default_version")]
    pub jsonrpc: String,

    /// Tool name or built-in method
    pub method: String,

    /// Parameter mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Correlation id
    #[serde(default)]
    pub id: Option<RequestId>,
}

impl ToolInvocationRequest {
    /// Create a request with no parameters
    pub fn new(method: impl Into<String>, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
            id,
        }
    }

    /// Add parameters to the request
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Parameters as a mapping. Absent or null params are an empty mapping;
    /// any other non-object value is returned back as an error.
    pub fn params_map(&self) -> Result<Map<String, Value>, &Value> {
        match &self.params {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(other),
        }
    }
}

/// Error object carried by an error envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Outbound envelope: exactly one of success or error
// Error is listed first: a missing `result` would otherwise decode as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Error {
        jsonrpc: String,
        error: RpcError,
        id: Option<RequestId>,
    },
    Success {
        jsonrpc: String,
        result: Value,
        id: Option<RequestId>,
    },
}

impl RpcResponse {
    /// Create a success envelope
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        RpcResponse::Success {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            id,
        }
    }

    /// Create an error envelope
    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        RpcResponse::Error {
            jsonrpc: JSONRPC_VERSION.to_string(),
            error,
            id,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            RpcResponse::Success { id, .. } | RpcResponse::Error { id, .. } => id.as_ref(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RpcResponse::Error { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            RpcResponse::Success { result, .. } => Some(result),
            RpcResponse::Error { .. } => None,
        }
    }

    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            RpcResponse::Error { error, .. } => Some(error),
            RpcResponse::Success { .. } => None,
        }
    }
}
