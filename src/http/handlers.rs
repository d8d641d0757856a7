use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::sse::Sse;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures_util::{future, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::mcp::{parse_request, McpError};
use crate::models::{RpcResponse, ToolInvocationRequest};
use crate::sse::BroadcastMessage;

use super::AppState;

const DOCS_HTML: &str = include_str!("docs.html");

pub async fn docs() -> Html<&'static str> {
    Html(DOCS_HTML)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "jina-mcp" }))
}

pub async fn discovery(State(state): State<AppState>) -> Json<Value> {
    Json(state.discovery_document())
}

/// Open an event stream. The stream's registration is released when the
/// body is dropped, which happens on client disconnect.
pub async fn sse(State(state): State<AppState>) -> Response {
    let connection = state.connections.accept();
    debug!(connection_id = %connection.id(), "opening event stream");

    let frames = connection
        .into_stream(state.connections.idle_timeout())
        .filter_map(|event| {
            let frame = match event.to_frame() {
                Ok(frame) => Some(Ok::<_, Infallible>(frame)),
                Err(e) => {
                    warn!(event = %event.event, error = %e, "skipping unframeable SSE event");
                    None
                }
            };
            future::ready(frame)
        });

    (
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        Sse::new(frames),
    )
        .into_response()
}

/// JSON-RPC endpoint
pub async fn rpc(State(state): State<AppState>, body: Bytes) -> Response {
    match parse_request(&body) {
        Ok(request) => Json(state.dispatcher.dispatch(request).await).into_response(),
        Err(response) => (StatusCode::BAD_REQUEST, Json(response)).into_response(),
    }
}

/// Invoke one tool with the request body as its parameters
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(params) => params,
            Err(e) => {
                let error = McpError::MalformedBody(e.to_string());
                let response = RpcResponse::error(None, error.to_rpc_error());
                return (StatusCode::BAD_REQUEST, Json(response)).into_response();
            }
        }
    };

    let request = ToolInvocationRequest::new(name, None).with_params(params);
    Json(state.dispatcher.dispatch(request).await).into_response()
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Push a message to every open event stream
pub async fn broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Response {
    let message = match BroadcastMessage::new(request.event, request.data) {
        Ok(message) => message.with_retry(state.connections.retry()),
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                .into_response()
        }
    };
    let delivered = state.connections.broadcast(&message);

    Json(json!({ "id": message.id, "delivered": delivered })).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures_util::StreamExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::http::{router, AppState};
    use crate::mcp::{Dispatcher, ToolRegistry};
    use crate::sse::ConnectionManager;
    use crate::upstream::mock::{MockReply, MockUpstream};

    fn state() -> (AppState, Arc<MockUpstream>) {
        let upstream = Arc::new(MockUpstream::new());
        let registry = ToolRegistry::with_jina_tools(upstream.clone()).unwrap();
        let state = AppState::new(
            Arc::new(Dispatcher::new(Arc::new(registry))),
            ConnectionManager::default(),
        );
        (state, upstream)
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = state();
        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"status": "healthy", "service": "jina-mcp"})
        );
    }

    #[tokio::test]
    async fn test_docs_page_is_html() {
        let (state, _) = state();
        let response = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_discovery_document_lists_tools() {
        let (state, _) = state();
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/.well-known/mcp.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let document = json_body(response).await;
        assert_eq!(document["name"], "jina-ai-search-mcp");
        assert_eq!(document["tools"].as_array().unwrap().len(), 2);
        assert_eq!(document["endpoints"]["rpc"], "/mcp");
    }

    #[tokio::test]
    async fn test_rpc_success() {
        let (state, upstream) = state();
        upstream.set_read_reply(MockReply::Ok("hello".to_string()));

        let response = router(state)
            .oneshot(post(
                "/mcp",
                r#"{"jsonrpc":"2.0","method":"jina.reader","params":{"url":"https://example.com"},"id":1}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"jsonrpc": "2.0", "result": {"content": "hello"}, "id": 1})
        );
    }

    #[tokio::test]
    async fn test_rpc_protocol_errors_are_200() {
        let (state, upstream) = state();

        let response = router(state)
            .oneshot(post(
                "/mcp",
                r#"{"jsonrpc":"2.0","method":"jina.crawl","params":{},"id":"x"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], -32601);
        assert_eq!(body["id"], "x");
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_rpc_malformed_body_is_400() {
        let (state, _) = state();

        let response = router(state)
            .oneshot(post("/mcp", "{oops"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_tool_endpoint() {
        let (state, upstream) = state();
        upstream.set_search_reply(MockReply::Ok(vec![json!({"title": "A"})]));

        let response = router(state.clone())
            .oneshot(post("/tools/jina.search", r#"{"q":"test","limit":2}"#))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["result"], json!([{"title": "A"}]));

        let response = router(state)
            .oneshot(post("/tools/jina.search", ""))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["error"]["data"]["missing"], json!(["q"]));
    }

    #[tokio::test]
    async fn test_sse_stream_and_broadcast() {
        let (state, _) = state();
        let connections = state.connections.clone();

        let response = router(state.clone())
            .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(connections.active_count(), 1);

        let mut frames = response.into_body().into_data_stream();
        let first = frames.next().await.unwrap().unwrap();
        assert!(String::from_utf8_lossy(&first).starts_with("event: connection\n"));

        let response = router(state)
            .oneshot(post("/broadcast", r#"{"event":"update","data":{"n":1}}"#))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["delivered"], 1);

        let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = String::from_utf8_lossy(&frame).to_string();
        assert!(frame.starts_with("event: update\n"));
        assert!(frame.lines().any(|line| line.trim_start_matches("retry:").trim() == "30000"));
        assert!(frame.ends_with("data: {\"n\":1}\n\n"));

        drop(frames);
        assert_eq!(connections.active_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_rejects_multiline_event_name() {
        let (state, _) = state();
        let connections = state.connections.clone();
        let mut connection = connections.accept();
        connection.next_event(Duration::from_secs(1)).await;

        let response = router(state)
            .oneshot(post(
                "/broadcast",
                r#"{"event":"update\ndata: forged\nid: evil","data":{"n":1}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("CR or LF"));
        assert!(connection
            .next_event(Duration::from_millis(50))
            .await
            .unwrap()
            .is_ping());
    }
}
