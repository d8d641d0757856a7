//! MCP (Model Context Protocol) implementation.
//!
//! Requests flow from a transport (see [`crate::http`]) into the
//! [`Dispatcher`], which resolves the target in the [`ToolRegistry`],
//! validates parameters against the tool's definition, and runs its handler.

mod dispatcher;
mod error;
mod handlers;
pub mod server;
mod tools;

pub use dispatcher::{
    parse_request, Dispatcher, ServerInfo, METHOD_CALL, METHOD_DISCOVER, METHOD_EXECUTE,
    METHOD_LIST_TOOLS, SERVER_NAME,
};
pub use error::{
    McpError, INVALID_PARAMS, INVALID_REQUEST, PARSE_ERROR, TOOL_EXECUTION_ERROR, UNKNOWN_TOOL,
    UPSTREAM_ERROR, UPSTREAM_TIMEOUT,
};
pub use handlers::{reader_tool, search_tool, ReaderHandler, SearchHandler, READER_TOOL, SEARCH_TOOL};
pub use server::{McpServer, ServerError};
pub use tools::{HandlerError, RegistryError, Tool, ToolHandler, ToolRegistry};
