//! Mock upstream for testing purposes.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{ReaderRequest, SearchRequest};
use crate::upstream::{Upstream, UpstreamError};

/// Canned reply for a mock call
#[derive(Debug, Clone)]
pub enum MockReply<T> {
    Ok(T),
    Status { status: u16, detail: String },
    Timeout,
    Panic(String),
}

/// An upstream that returns predefined replies and counts calls.
#[derive(Debug)]
pub struct MockUpstream {
    read_reply: Mutex<MockReply<String>>,
    search_reply: Mutex<MockReply<Vec<Value>>>,
    read_calls: AtomicUsize,
    search_calls: AtomicUsize,
    last_read: Mutex<Option<ReaderRequest>>,
    last_search: Mutex<Option<SearchRequest>>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpstream {
    /// Create a mock that answers with empty content and no results.
    pub fn new() -> Self {
        Self {
            read_reply: Mutex::new(MockReply::Ok(String::new())),
            search_reply: Mutex::new(MockReply::Ok(Vec::new())),
            read_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            last_read: Mutex::new(None),
            last_search: Mutex::new(None),
        }
    }

    pub fn set_read_reply(&self, reply: MockReply<String>) {
        if let Ok(mut guard) = self.read_reply.lock() {
            *guard = reply;
        }
    }

    pub fn set_search_reply(&self, reply: MockReply<Vec<Value>>) {
        if let Ok(mut guard) = self.search_reply.lock() {
            *guard = reply;
        }
    }

    /// Total number of upstream calls of either kind
    pub fn calls(&self) -> usize {
        self.read_calls() + self.search_calls()
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn last_read(&self) -> Option<ReaderRequest> {
        self.last_read.lock().ok().and_then(|g| g.clone())
    }

    pub fn last_search(&self) -> Option<SearchRequest> {
        self.last_search.lock().ok().and_then(|g| g.clone())
    }
}

fn resolve<T: Clone>(reply: &Mutex<MockReply<T>>) -> Result<T, UpstreamError> {
    let reply = reply
        .lock()
        .map_err(|_| UpstreamError::Network("mock poisoned".to_string()))?
        .clone();

    match reply {
        MockReply::Ok(value) => Ok(value),
        MockReply::Status { status, detail } => Err(UpstreamError::Status { status, detail }),
        MockReply::Timeout => Err(UpstreamError::Timeout(crate::utils::DEFAULT_TIMEOUT)),
        MockReply::Panic(message) => panic!("{}", message),
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn read_url(&self, request: &ReaderRequest) -> Result<String, UpstreamError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_read.lock() {
            *guard = Some(request.clone());
        }
        resolve(&self.read_reply)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, UpstreamError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_search.lock() {
            *guard = Some(request.clone());
        }
        resolve(&self.search_reply)
    }
}
