//! Reader and search tool definitions and their handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::models::{
    ParamType, ReaderRequest, SearchRequest, ToolArguments, ToolDefinition, ToolParameter,
    DEFAULT_SEARCH_LIMIT,
};
use crate::upstream::Upstream;

use super::tools::{HandlerError, ToolHandler};

pub const READER_TOOL: &str = "jina.reader";
pub const SEARCH_TOOL: &str = "jina.search";

/// Definition of the URL-to-markdown tool
pub fn reader_tool() -> ToolDefinition {
    ToolDefinition::new(
        READER_TOOL,
        "Read a web page and return its content as markdown",
    )
    .param(ToolParameter::required(
        "url",
        ParamType::String,
        "URL of the page to read",
    ))
    .param(ToolParameter::optional(
        "with_links_summary",
        ParamType::Boolean,
        "Append a summary of all links found on the page",
    ))
    .param(ToolParameter::optional(
        "with_metadata",
        ParamType::Boolean,
        "Include page metadata",
    ))
    .param(ToolParameter::optional(
        "with_highlight",
        ParamType::Boolean,
        "Highlight the main content",
    ))
    .param(ToolParameter::optional(
        "with_shadow_dom",
        ParamType::Boolean,
        "Extract content from shadow DOM",
    ))
    .returns("object", "Object with a 'content' field holding the page markdown")
}

/// Definition of the web search tool
pub fn search_tool() -> ToolDefinition {
    ToolDefinition::new(SEARCH_TOOL, "Search the web and return the top results")
        .param(ToolParameter::required(
            "q",
            ParamType::String,
            "Search query",
        ))
        .param(
            ToolParameter::optional("limit", ParamType::Integer, "Number of results to return")
                .with_default(DEFAULT_SEARCH_LIMIT),
        )
        .param(ToolParameter::optional(
            "with_images",
            ParamType::Boolean,
            "Include image results",
        ))
        .param(ToolParameter::optional(
            "with_favicons",
            ParamType::Boolean,
            "Include site favicons",
        ))
        .param(ToolParameter::optional(
            "locale",
            ParamType::String,
            "Locale for the results, e.g. 'en-US'",
        ))
        .returns("array", "Search result records as returned by the search API")
}

/// Handler for `jina.reader`
#[derive(Debug)]
pub struct ReaderHandler {
    upstream: Arc<dyn Upstream>,
}

impl ReaderHandler {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }
}

#[async_trait::async_trait]
impl ToolHandler for ReaderHandler {
    async fn execute(&self, args: ToolArguments) -> Result<Value, HandlerError> {
        let url = args
            .str("url")
            .ok_or_else(|| HandlerError::Failed("Missing 'url' parameter".to_string()))?;

        let mut request = ReaderRequest::new(url);
        if let Some(enabled) = args.boolean("with_links_summary") {
            request = request.links_summary(enabled);
        }
        if let Some(enabled) = args.boolean("with_metadata") {
            request = request.metadata(enabled);
        }
        if let Some(enabled) = args.boolean("with_highlight") {
            request = request.highlight(enabled);
        }
        if let Some(enabled) = args.boolean("with_shadow_dom") {
            request = request.shadow_dom(enabled);
        }

        let content = self.upstream.read_url(&request).await?;
        info!(url, bytes = content.len(), "read page");

        Ok(json!({ "content": content }))
    }
}

/// Handler for `jina.search`
#[derive(Debug)]
pub struct SearchHandler {
    upstream: Arc<dyn Upstream>,
}

impl SearchHandler {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }
}

#[async_trait::async_trait]
impl ToolHandler for SearchHandler {
    async fn execute(&self, args: ToolArguments) -> Result<Value, HandlerError> {
        let query = args
            .str("q")
            .ok_or_else(|| HandlerError::Failed("Missing 'q' parameter".to_string()))?;

        let limit = args.integer("limit").unwrap_or(DEFAULT_SEARCH_LIMIT);
        if limit < 1 {
            return Err(HandlerError::Failed(format!(
                "'limit' must be at least 1, got {}",
                limit
            )));
        }

        let mut request = SearchRequest::new(query).limit(limit);
        if let Some(enabled) = args.boolean("with_images") {
            request = request.images(enabled);
        }
        if let Some(enabled) = args.boolean("with_favicons") {
            request = request.favicons(enabled);
        }
        if let Some(locale) = args.str("locale") {
            request = request.locale(locale);
        }

        let results = self.upstream.search(&request).await?;
        info!(query, limit, results = results.len(), "search finished");

        Ok(Value::Array(results))
    }
}
