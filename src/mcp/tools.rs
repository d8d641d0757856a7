//! Tool registry for MCP tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::models::{ToolArguments, ToolDefinition};
use crate::upstream::{Upstream, UpstreamError};

use super::handlers::{reader_tool, search_tool, ReaderHandler, SearchHandler};

/// A registered tool: its definition plus the handler that runs it
#[derive(Clone)]
pub struct Tool {
    pub definition: ToolDefinition,

    /// Handler function to execute the tool
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.definition.name)
            .field("description", &self.definition.description)
            .field("parameters", &self.definition.parameters.len())
            .finish()
    }
}

/// Handler for executing a tool
///
/// Arguments have already been validated against the tool's definition, so
/// handlers may rely on required parameters being present and well typed.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with the given arguments
    async fn execute(&self, args: ToolArguments) -> Result<Value, HandlerError>;
}

/// Failure raised by a tool handler
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Failed(String),
}

/// Registration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool '{tool}' has an invalid definition: {reason}")]
    InvalidDefinition { tool: String, reason: String },
}

/// Registry for all MCP tools
///
/// Filled once at startup and read-only afterwards. Listing preserves
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the reader and search tools
    pub fn with_jina_tools(upstream: Arc<dyn Upstream>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(
            reader_tool(),
            Arc::new(ReaderHandler::new(upstream.clone())),
        )?;
        registry.register(search_tool(), Arc::new(SearchHandler::new(upstream)))?;
        Ok(registry)
    }

    /// Add a tool. Names must be unique and definitions self-consistent.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateTool(definition.name));
        }

        definition
            .check_consistency()
            .map_err(|reason| RegistryError::InvalidDefinition {
                tool: definition.name.clone(),
                reason,
            })?;

        tracing::debug!(tool = %definition.name, "registered tool");
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(Tool {
            definition,
            handler,
        });
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Get a tool definition by name
    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.get(name).map(|tool| &tool.definition)
    }

    /// All definitions in registration order
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.iter().map(|tool| &tool.definition).collect()
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|tool| tool.definition.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
