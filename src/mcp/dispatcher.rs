//! JSON-RPC dispatch: parse an envelope, route it, and shape the reply.
//!
//! Besides registered tools the dispatcher answers three built-in methods:
//!
//! - `mcp.discover`: server name, version and capabilities
//! - `tools/list`: every registered tool definition
//! - `tools/execute` (alias `tools/call`): `{name, arguments}` indirection to
//!   a registered tool
//!
//! Any other method is treated as a tool name.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, info_span, warn, Instrument};

use crate::models::{
    json_type_name, ParamType, RequestId, RpcResponse, ToolInvocationRequest, Violation,
    JSONRPC_VERSION,
};

use super::error::McpError;
use super::tools::{HandlerError, ToolRegistry};

pub const SERVER_NAME: &str = "jina-ai-search-mcp";

pub const METHOD_DISCOVER: &str = "mcp.discover";
pub const METHOD_LIST_TOOLS: &str = "tools/list";
pub const METHOD_EXECUTE: &str = "tools/execute";
pub const METHOD_CALL: &str = "tools/call";

/// Identity advertised by `mcp.discover` and the discovery document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub capabilities: Vec<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: crate::VERSION.to_string(),
            capabilities: vec![
                METHOD_LIST_TOOLS.to_string(),
                METHOD_EXECUTE.to_string(),
                "stream".to_string(),
            ],
        }
    }
}

/// Routes invocation requests to tools
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            info: ServerInfo::default(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Handle one request. Never fails: every outcome is an envelope that
    /// echoes the request id.
    pub async fn dispatch(&self, request: ToolInvocationRequest) -> RpcResponse {
        let id = request.id.clone();
        let span = info_span!(
            "dispatch",
            method = %request.method,
            id = %id.as_ref().map(ToString::to_string).unwrap_or_default()
        );

        async move {
            let started = Instant::now();
            match self.route(&request).await {
                Ok(result) => {
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    RpcResponse::success(id, result)
                }
                Err(err) => {
                    warn!(
                        code = err.code(),
                        error = %err,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "request failed"
                    );
                    RpcResponse::error(id, err.to_rpc_error())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn route(&self, request: &ToolInvocationRequest) -> Result<Value, McpError> {
        // Introspection ignores params entirely.
        match request.method.as_str() {
            METHOD_DISCOVER => return Ok(json!(self.info)),
            METHOD_LIST_TOOLS => return Ok(json!({ "tools": self.registry.list() })),
            _ => {}
        }

        let params = request.params_map().map_err(|value| {
            McpError::InvalidParameters(vec![Violation::NotAnObject {
                actual: json_type_name(value).to_string(),
            }])
        })?;

        match request.method.as_str() {
            METHOD_EXECUTE | METHOD_CALL => {
                let (name, arguments) = split_call_params(params)?;
                self.invoke(&name, arguments).await
            }
            tool => self.invoke(tool, params).await,
        }
    }

    /// Validate parameters against a tool's definition and run its handler.
    ///
    /// The handler is never reached when the tool is unknown or the
    /// parameters are invalid. A handler panic is reported as a tool
    /// execution error.
    pub async fn invoke(&self, name: &str, params: Map<String, Value>) -> Result<Value, McpError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;

        let args = tool
            .definition
            .validate(&params)
            .map_err(McpError::InvalidParameters)?;

        match AssertUnwindSafe(tool.handler.execute(args))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(HandlerError::Upstream(err))) => Err(err.into()),
            Ok(Err(HandlerError::Failed(message))) => Err(McpError::ToolExecution(message)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = name, panic = %message, "tool handler panicked");
                Err(McpError::ToolExecution(message))
            }
        }
    }
}

/// Split `tools/execute` params into the target tool name and its arguments
fn split_call_params(
    mut params: Map<String, Value>,
) -> Result<(String, Map<String, Value>), McpError> {
    let mut violations = Vec::new();

    let name = match params.remove("name") {
        Some(Value::String(name)) => Some(name),
        None | Some(Value::Null) => {
            violations.push(Violation::Missing {
                parameter: "name".to_string(),
            });
            None
        }
        Some(other) => {
            violations.push(Violation::TypeMismatch {
                parameter: "name".to_string(),
                expected: ParamType::String,
                actual: json_type_name(&other).to_string(),
            });
            None
        }
    };

    let arguments = match params.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments,
        Some(other) => {
            violations.push(Violation::NotAnObject {
                actual: json_type_name(&other).to_string(),
            });
            Map::new()
        }
    };

    violations.extend(params.keys().map(|key| Violation::Unexpected {
        parameter: key.clone(),
    }));

    match name {
        Some(name) if violations.is_empty() => Ok((name, arguments)),
        _ => Err(McpError::InvalidParameters(violations)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("tool panicked: {}", message)
    } else {
        "tool panicked".to_string()
    }
}

/// Decode a raw request body into an envelope.
///
/// On failure the error reply is returned ready to send, with the request id
/// recovered from the body when it is readable.
pub fn parse_request(body: &[u8]) -> Result<ToolInvocationRequest, RpcResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        RpcResponse::error(None, McpError::MalformedBody(e.to_string()).to_rpc_error())
    })?;

    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
    let malformed = |message: String| {
        RpcResponse::error(
            id.clone(),
            McpError::MalformedEnvelope(message).to_rpc_error(),
        )
    };

    if !value.is_object() {
        return Err(malformed(format!(
            "request must be an object, got {}",
            json_type_name(&value)
        )));
    }

    let request: ToolInvocationRequest =
        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(malformed(format!(
            "unsupported jsonrpc version '{}'",
            request.jsonrpc
        )));
    }
    if request.method.is_empty() {
        return Err(malformed("method must not be empty".to_string()));
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::error::{INVALID_PARAMS, INVALID_REQUEST, PARSE_ERROR, UNKNOWN_TOOL};
    use crate::mcp::tools::ToolHandler;
    use crate::models::{ToolArguments, ToolDefinition};
    use crate::upstream::mock::{MockReply, MockUpstream};

    fn dispatcher() -> (Dispatcher, Arc<MockUpstream>) {
        let upstream = Arc::new(MockUpstream::new());
        let registry = ToolRegistry::with_jina_tools(upstream.clone()).unwrap();
        (Dispatcher::new(Arc::new(registry)), upstream)
    }

    fn request(method: &str, params: Value) -> ToolInvocationRequest {
        ToolInvocationRequest::new(method, Some(RequestId::from(1i64))).with_params(params)
    }

    #[tokio::test]
    async fn test_reader_success_envelope() {
        let (dispatcher, upstream) = dispatcher();
        upstream.set_read_reply(MockReply::Ok("hello".to_string()));

        let response = dispatcher
            .dispatch(request("jina.reader", json!({"url": "https://example.com"})))
            .await;

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"jsonrpc": "2.0", "result": {"content": "hello"}, "id": 1})
        );
    }

    #[tokio::test]
    async fn test_search_returns_array_verbatim() {
        let (dispatcher, upstream) = dispatcher();
        upstream.set_search_reply(MockReply::Ok(vec![json!({"title": "A"}), json!({"title": "B"})]));

        let response = dispatcher
            .dispatch(request("jina.search", json!({"q": "test", "limit": 2})))
            .await;

        assert_eq!(
            response.result(),
            Some(&json!([{"title": "A"}, {"title": "B"}]))
        );
        assert_eq!(upstream.last_search().unwrap().limit, 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_reaches_upstream() {
        let (dispatcher, upstream) = dispatcher();

        let response = dispatcher.dispatch(request("jina.crawl", json!({}))).await;

        let error = response.rpc_error().unwrap();
        assert_eq!(error.code, UNKNOWN_TOOL);
        assert_eq!(response.id(), Some(&RequestId::from(1i64)));
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_parameter_never_reaches_upstream() {
        let (dispatcher, upstream) = dispatcher();

        let response = dispatcher.dispatch(request("jina.reader", json!({}))).await;

        let error = response.rpc_error().unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert_eq!(error.data.as_ref().unwrap()["missing"], json!(["url"]));
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_violations_reported_together() {
        let (dispatcher, upstream) = dispatcher();

        let response = dispatcher
            .dispatch(request("jina.search", json!({"limit": "ten", "page": 2})))
            .await;

        let data = response.rpc_error().unwrap().data.clone().unwrap();
        assert_eq!(data["violations"].as_array().unwrap().len(), 3);
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_object_params_is_invalid_parameters() {
        let (dispatcher, upstream) = dispatcher();

        let response = dispatcher
            .dispatch(request("jina.search", json!(["test"])))
            .await;

        assert_eq!(response.rpc_error().unwrap().code, INVALID_PARAMS);
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_introspection_ignores_params() {
        let (dispatcher, upstream) = dispatcher();

        let response = dispatcher
            .dispatch(request(METHOD_DISCOVER, json!(["unused"])))
            .await;
        assert_eq!(response.result().unwrap()["name"], SERVER_NAME);

        let response = dispatcher
            .dispatch(request(METHOD_LIST_TOOLS, json!("unused")))
            .await;
        assert_eq!(response.result().unwrap()["tools"].as_array().unwrap().len(), 2);
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_status_maps_to_upstream_error() {
        let (dispatcher, upstream) = dispatcher();
        upstream.set_search_reply(MockReply::Status {
            status: 402,
            detail: "Insufficient balance".to_string(),
        });

        let response = dispatcher
            .dispatch(request("jina.search", json!({"q": "test"})))
            .await;

        let error = response.rpc_error().unwrap();
        assert_eq!(error.code, -32001);
        assert_eq!(
            error.data,
            Some(json!({"status": 402, "detail": "Insufficient balance"}))
        );
    }

    #[tokio::test]
    async fn test_upstream_timeout_maps_to_timeout_error() {
        let (dispatcher, upstream) = dispatcher();
        upstream.set_read_reply(MockReply::Timeout);

        let response = dispatcher
            .dispatch(request("jina.reader", json!({"url": "https://example.com"})))
            .await;

        assert_eq!(response.rpc_error().unwrap().code, -32002);
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let (dispatcher, upstream) = dispatcher();
        upstream.set_read_reply(MockReply::Panic("boom".to_string()));

        let response = dispatcher
            .dispatch(request("jina.reader", json!({"url": "https://example.com"})))
            .await;

        let error = response.rpc_error().unwrap();
        assert_eq!(error.code, -32000);
        assert!(error.message.contains("boom"));

        // The dispatcher keeps serving afterwards.
        upstream.set_read_reply(MockReply::Ok("ok".to_string()));
        let response = dispatcher
            .dispatch(request("jina.reader", json!({"url": "https://example.com"})))
            .await;
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_discover_and_list() {
        let (dispatcher, _) = dispatcher();

        let response = dispatcher
            .dispatch(ToolInvocationRequest::new("mcp.discover", None))
            .await;
        let result = response.result().unwrap();
        assert_eq!(result["name"], "jina-ai-search-mcp");
        assert_eq!(
            result["capabilities"],
            json!(["tools/list", "tools/execute", "stream"])
        );
        assert_eq!(response.id(), None);

        let response = dispatcher
            .dispatch(ToolInvocationRequest::new("tools/list", None))
            .await;
        let tools = response.result().unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "jina.reader");
        assert_eq!(tools[1]["parameters"][1]["default"], 5);
    }

    #[tokio::test]
    async fn test_tools_execute_indirection() {
        let (dispatcher, upstream) = dispatcher();
        upstream.set_read_reply(MockReply::Ok("page".to_string()));

        let response = dispatcher
            .dispatch(request(
                "tools/execute",
                json!({"name": "jina.reader", "arguments": {"url": "https://example.com"}}),
            ))
            .await;
        assert_eq!(response.result(), Some(&json!({"content": "page"})));

        let response = dispatcher
            .dispatch(request("tools/call", json!({"arguments": {}})))
            .await;
        let error = response.rpc_error().unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert_eq!(error.data.as_ref().unwrap()["missing"], json!(["name"]));

        let response = dispatcher
            .dispatch(request("tools/call", json!({"name": "nope"})))
            .await;
        assert_eq!(response.rpc_error().unwrap().code, UNKNOWN_TOOL);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_keeps_ids() {
        let (dispatcher, upstream) = dispatcher();
        upstream.set_search_reply(MockReply::Ok(vec![]));

        let calls = (0..16i64).map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let request = ToolInvocationRequest::new("jina.search", Some(RequestId::from(i)))
                    .with_params(json!({"q": format!("query {i}")}));
                (i, dispatcher.dispatch(request).await)
            })
        });

        for call in calls {
            let (i, response) = call.await.unwrap();
            assert_eq!(response.id(), Some(&RequestId::from(i)));
            assert!(!response.is_error());
        }
        assert_eq!(upstream.search_calls(), 16);
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait::async_trait]
    impl ToolHandler for Failing {
        async fn execute(&self, _args: ToolArguments) -> Result<Value, HandlerError> {
            Err(HandlerError::Failed("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_handler_failure_is_tool_execution_error() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::new("fail", "Always fails"), Arc::new(Failing))
            .unwrap();
        let dispatcher = Dispatcher::new(Arc::new(registry));

        let err = dispatcher.invoke("fail", Map::new()).await.unwrap_err();
        assert_eq!(err, McpError::ToolExecution("disk full".to_string()));
    }

    #[test]
    fn test_parse_request_errors() {
        let response = parse_request(b"{not json").unwrap_err();
        assert_eq!(response.rpc_error().unwrap().code, PARSE_ERROR);
        assert_eq!(response.id(), None);

        let response = parse_request(br#"{"jsonrpc": "2.0", "id": 9}"#).unwrap_err();
        assert_eq!(response.rpc_error().unwrap().code, INVALID_REQUEST);
        assert_eq!(response.id(), Some(&RequestId::from(9i64)));

        let response =
            parse_request(br#"{"jsonrpc": "1.0", "method": "tools/list", "id": "a"}"#).unwrap_err();
        assert_eq!(response.rpc_error().unwrap().code, INVALID_REQUEST);

        let response = parse_request(b"[1, 2]").unwrap_err();
        assert_eq!(response.rpc_error().unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn test_parse_request_accepts_minimal_envelope() {
        let request = parse_request(br#"{"method": "tools/list"}"#).unwrap();
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.id, None);
    }
}
