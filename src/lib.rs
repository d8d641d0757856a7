//! # Jina MCP
//!
//! A Model Context Protocol (MCP) gateway exposing the Jina reader and search
//! APIs as JSON-RPC tools, with a server-sent events broadcast channel.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Tool schemas, protocol envelopes and upstream requests
//! - [`upstream`]: The reader/search API client behind a trait
//! - [`mcp`]: Tool registry, dispatcher and server
//! - [`sse`]: Connection manager and event framing for streaming clients
//! - [`http`]: Axum routes
//! - [`utils`]: Shared HTTP client
//! - [`config`]: Configuration management

pub mod config;
pub mod http;
pub mod mcp;
pub mod models;
pub mod sse;
pub mod upstream;
pub mod utils;

// Re-export commonly used types
pub use mcp::{Dispatcher, McpError, McpServer, ToolRegistry};
pub use models::{RpcResponse, ToolDefinition, ToolInvocationRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
