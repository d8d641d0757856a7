//! Jina reader/search API client.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::UpstreamConfig;
use crate::models::{ReaderRequest, SearchRequest};
use crate::utils::HttpClient;

use super::{Upstream, UpstreamError};

pub const DEFAULT_READER_ENDPOINT: &str = "https://r.jina.ai/";
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://s.jina.ai/";

/// Client for the Jina reader and search endpoints
///
/// Credentials and the per-call timeout live on the shared [`HttpClient`].
#[derive(Debug, Clone)]
pub struct JinaClient {
    http: HttpClient,
    reader_endpoint: String,
    search_endpoint: String,
}

impl JinaClient {
    /// Create a client against the public endpoints
    pub fn new(http: HttpClient) -> Self {
        Self::with_endpoints(http, DEFAULT_READER_ENDPOINT, DEFAULT_SEARCH_ENDPOINT)
    }

    /// Create a client against custom endpoints
    pub fn with_endpoints(
        http: HttpClient,
        reader_endpoint: impl Into<String>,
        search_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http,
            reader_endpoint: reader_endpoint.into(),
            search_endpoint: search_endpoint.into(),
        }
    }

    /// Create a client from configuration
    pub fn from_config(
        config: &UpstreamConfig,
        api_key: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder()
            .timeout(config.timeout())
            .bearer_token(api_key)
            .build()?;

        Ok(Self::with_endpoints(
            http,
            config.reader_url(),
            config.search_url(),
        ))
    }

    pub fn reader_endpoint(&self) -> &str {
        &self.reader_endpoint
    }

    pub fn search_endpoint(&self) -> &str {
        &self.search_endpoint
    }

    fn map_send_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.http.timeout())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }

    /// One POST round trip; returns the decoded JSON body of a 2xx reply
    async fn post_json(
        &self,
        endpoint: &str,
        body: Value,
        headers: Vec<(&'static str, String)>,
    ) -> Result<Value, UpstreamError> {
        let mut builder = self.http.client().post(endpoint).json(&body);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        debug!(
            endpoint,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream call finished"
        );

        if !status.is_success() {
            let err = UpstreamError::from_status_body(status.as_u16(), &text);
            error!(endpoint, error = %err, "upstream call failed");
            return Err(err);
        }

        serde_json::from_str(&text)
            .map_err(|e| UpstreamError::Parse(format!("Failed to parse JSON: {}", e)))
    }
}

#[async_trait]
impl Upstream for JinaClient {
    async fn read_url(&self, request: &ReaderRequest) -> Result<String, UpstreamError> {
        let body = self
            .post_json(
                &self.reader_endpoint,
                json!({ "url": request.url }),
                request.option_headers(),
            )
            .await?;

        Ok(body
            .pointer("/data/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, UpstreamError> {
        let body = self
            .post_json(
                &self.search_endpoint,
                json!({ "q": request.q, "num": request.limit }),
                request.option_headers(),
            )
            .await?;

        match body.get("data") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(results)) => Ok(results.clone()),
            Some(other) => Err(UpstreamError::Parse(format!(
                "expected 'data' to be an array, got {}",
                crate::models::json_type_name(other)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn client_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> JinaClient {
        let http = HttpClient::builder()
            .bearer_token(api_key.map(str::to_string))
            .build()
            .unwrap();
        JinaClient::with_endpoints(
            http,
            format!("{}/reader", server.url()),
            format!("{}/search", server.url()),
        )
    }

    #[tokio::test]
    async fn test_read_url_extracts_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/reader")
            .match_header("authorization", "Bearer secret")
            .match_header("accept", "application/json")
            .match_body(Matcher::Json(json!({"url": "https://example.com"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"content":"hello"}}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let content = client
            .read_url(&ReaderRequest::new("https://example.com"))
            .await
            .unwrap();

        assert_eq!(content, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_url_missing_content_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reader")
            .with_status(200)
            .with_body(r#"{"data":{}}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let content = client
            .read_url(&ReaderRequest::new("https://example.com"))
            .await
            .unwrap();
        assert_eq!(content, "");
    }

    #[tokio::test]
    async fn test_reader_flags_sent_as_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/reader")
            .match_header("x-with-links-summary", "true")
            .match_header("x-with-metadata", Matcher::Missing)
            .match_body(Matcher::Json(json!({"url": "https://example.com"})))
            .with_status(200)
            .with_body(r#"{"data":{"content":"ok"}}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        client
            .read_url(&ReaderRequest::new("https://example.com").links_summary(true))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_returns_data_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(Matcher::Json(json!({"q": "test", "num": 2})))
            .with_status(200)
            .with_body(r#"{"data":[{"title":"A"},{"title":"B"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let results = client
            .search(&SearchRequest::new("test").limit(2))
            .await
            .unwrap();

        assert_eq!(results, vec![json!({"title": "A"}), json!({"title": "B"})]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_without_data_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(200)
            .with_body(r#"{"code":200}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let results = client.search(&SearchRequest::new("none")).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_non_array_data_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(200)
            .with_body(r#"{"data":"oops"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.search(&SearchRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }

    #[tokio::test]
    async fn test_non_2xx_carries_status_and_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reader")
            .with_status(402)
            .with_body(r#"{"detail":"Insufficient balance"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client
            .read_url(&ReaderRequest::new("https://example.com"))
            .await
            .unwrap_err();

        match err {
            UpstreamError::Status { status, detail } => {
                assert_eq!(status, 402);
                assert_eq!(detail, "Insufficient balance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reader")
            .with_status(200)
            .with_body("# plain markdown")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client
            .read_url(&ReaderRequest::new("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let http = HttpClient::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let endpoint = format!("http://{}/", addr);
        let client = JinaClient::with_endpoints(http, endpoint.clone(), endpoint);

        let err = client.search(&SearchRequest::new("slow")).await.unwrap_err();
        match err {
            UpstreamError::Timeout(timeout) => assert_eq!(timeout, Duration::from_millis(200)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let http = HttpClient::new().unwrap();
        let endpoint = format!("http://{}/", addr);
        let client = JinaClient::with_endpoints(http, endpoint.clone(), endpoint);

        let err = client
            .read_url(&ReaderRequest::new("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Network(_)));
    }
}
