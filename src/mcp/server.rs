//! MCP server: wires configuration, upstream client, tools and transports.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{Config, ConfigError};
use crate::http::{router, AppState};
use crate::sse::ConnectionManager;
use crate::upstream::{JinaClient, Upstream};

use super::dispatcher::Dispatcher;
use super::tools::{RegistryError, ToolRegistry};

/// Errors raised while building or running the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The MCP server for the Jina reader and search tools
///
/// Cheap to clone; clones share the dispatcher and the SSE connection set.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    connections: ConnectionManager,
}

impl McpServer {
    /// Create a server talking to the configured upstream endpoints
    pub fn new(config: &Config) -> Result<Self, ServerError> {
        config.validate()?;
        let upstream = JinaClient::from_config(&config.upstream, config.api_keys.jina.clone())?;
        Self::with_upstream(config, Arc::new(upstream))
    }

    /// Create a server around any upstream implementation
    pub fn with_upstream(
        config: &Config,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self, ServerError> {
        let registry = ToolRegistry::with_jina_tools(upstream)?;
        tracing::debug!(tools = ?registry.names(), "tool registry ready");

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(Arc::new(registry))),
            connections: ConnectionManager::new(&config.sse),
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// The HTTP application
    pub fn router(&self) -> axum::Router {
        router(AppState::new(
            self.dispatcher.clone(),
            self.connections.clone(),
        ))
    }

    /// Bind and serve in the background.
    ///
    /// Returns the bound address (useful with port 0) and the server task.
    /// When `shutdown` resolves the server stops accepting connections and
    /// every open event stream is closed.
    pub async fn start<F>(
        &self,
        addr: &str,
        shutdown: F,
    ) -> Result<(SocketAddr, JoinHandle<std::io::Result<()>>), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let invalid = |reason: String| ServerError::InvalidAddress {
            addr: addr.to_string(),
            reason,
        };
        let socket_addr = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("no addresses resolved".to_string()))?;

        let listener = TcpListener::bind(socket_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Starting MCP server in HTTP/SSE mode on {}", local_addr);
        tracing::info!(
            rpc = crate::http::PATH_RPC,
            sse = crate::http::PATH_SSE,
            discovery = crate::http::PATH_DISCOVERY,
            "Endpoints ready"
        );

        let app = self.router();
        let connections = self.connections.clone();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown.await;
                    tracing::info!("Shutdown requested");
                    connections.close_all();
                })
                .await
        });

        Ok((local_addr, handle))
    }

    /// Serve until `shutdown` resolves
    pub async fn run_http<F>(&self, addr: &str, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (_, handle) = self.start(addr, shutdown).await?;
        match handle.await {
            Ok(result) => result.map_err(ServerError::from),
            Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
        }
    }
}
