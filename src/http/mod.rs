//! HTTP surface: docs, health, discovery, SSE and the JSON-RPC endpoint.

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::mcp::Dispatcher;
use crate::sse::ConnectionManager;

pub const PATH_DOCS: &str = "/";
pub const PATH_HEALTH: &str = "/health";
pub const PATH_DISCOVERY: &str = "/.well-known/mcp.json";
pub const PATH_SSE: &str = "/sse";
pub const PATH_RPC: &str = "/mcp";
pub const PATH_TOOL: &str = "/tools/{name}";
pub const PATH_BROADCAST: &str = "/broadcast";

/// Shared application state passed to all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub connections: ConnectionManager,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, connections: ConnectionManager) -> Self {
        Self {
            dispatcher,
            connections,
        }
    }

    /// Document served at `/.well-known/mcp.json`
    pub fn discovery_document(&self) -> Value {
        let info = self.dispatcher.info();
        json!({
            "name": info.name,
            "version": info.version,
            "capabilities": info.capabilities,
            "tools": self.dispatcher.registry().list(),
            "endpoints": {
                "rpc": PATH_RPC,
                "sse": PATH_SSE,
                "tools": PATH_TOOL,
                "broadcast": PATH_BROADCAST,
                "health": PATH_HEALTH,
            },
        })
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(PATH_DOCS, get(handlers::docs))
        .route(PATH_HEALTH, get(handlers::health))
        .route(PATH_DISCOVERY, get(handlers::discovery))
        .route(PATH_SSE, get(handlers::sse))
        .route(PATH_RPC, post(handlers::rpc))
        .route(PATH_TOOL, post(handlers::call_tool))
        .route(PATH_BROADCAST, post(handlers::broadcast))
        .layer(cors)
        .with_state(state)
}
