//! Clients for the remote reader and search APIs.
//!
//! This module defines the [`Upstream`] trait the tool handlers call. The
//! production implementation is [`JinaClient`]; every call is a single HTTP
//! round trip with a bounded timeout. There are no retries and nothing is
//! cached, so the upstream reply is authoritative.
//!
//! # Endpoints
//!
//! - Reader: `POST {"url": ...}`, replies `{"data": {"content": ...}}`
//! - Search: `POST {"q": ..., "num": ...}`, replies `{"data": [...]}`
//!
//! Optional flags travel as `X-*` request headers (see
//! [`ReaderRequest::option_headers`] and [`SearchRequest::option_headers`]).

mod jina;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{ReaderRequest, SearchRequest};

pub use jina::{JinaClient, DEFAULT_READER_ENDPOINT, DEFAULT_SEARCH_ENDPOINT};

/// The remote reader/search service
#[async_trait]
pub trait Upstream: Send + Sync + std::fmt::Debug {
    /// Convert a page to markdown. Returns `data.content`, or an empty
    /// string when the upstream omits it.
    async fn read_url(&self, request: &ReaderRequest) -> Result<String, UpstreamError>;

    /// Run a web search. Returns the upstream `data` array, possibly empty.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, UpstreamError>;
}

/// Errors that can occur when calling the upstream API
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Non-2xx reply
    #[error("HTTP error {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The call exceeded its timeout
    #[error("upstream request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The reply could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl UpstreamError {
    /// HTTP status of the failed reply, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build a status error from a reply body: the JSON `detail` field when
    /// present, otherwise the JSON body, otherwise the raw text.
    pub fn from_status_body(status: u16, body: &str) -> Self {
        let detail = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => match map.get("detail") {
                Some(Value::String(detail)) => detail.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(map).to_string(),
            },
            Ok(other) => other.to_string(),
            Err(_) => body.to_string(),
        };

        UpstreamError::Status { status, detail }
    }
}
