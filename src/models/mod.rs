//! Core data models for tool schemas, protocol envelopes and upstream requests.

mod rpc;
mod tool;
mod upstream;

pub use rpc::{RequestId, RpcError, RpcResponse, ToolInvocationRequest, JSONRPC_VERSION};
pub use tool::{
    json_type_name, ParamType, ReturnShape, ToolArguments, ToolDefinition, ToolParameter,
    Violation,
};
pub use upstream::{ReaderRequest, SearchRequest, DEFAULT_SEARCH_LIMIT};
