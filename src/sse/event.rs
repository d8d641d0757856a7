//! Server-sent event frames and broadcast payloads.

use std::time::Duration;

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const EVENT_CONNECTION: &str = "connection";
pub const EVENT_PING: &str = "ping";

/// Reconnect interval suggested to clients when none is configured
pub const DEFAULT_RETRY: Duration = Duration::from_millis(30_000);

/// A field value that cannot be written as a single SSE line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("event name must not be empty")]
    EmptyEventName,

    #[error("{field} must not contain CR or LF")]
    LineBreak { field: &'static str },
}

/// Check that `name` can be sent as an `event:` field.
pub fn validate_event_name(name: &str) -> Result<(), FrameError> {
    if name.is_empty() {
        return Err(FrameError::EmptyEventName);
    }
    single_line("event", name)
}

fn single_line(field: &'static str, value: &str) -> Result<(), FrameError> {
    if value.contains(['\r', '\n']) {
        Err(FrameError::LineBreak { field })
    } else {
        Ok(())
    }
}

/// One frame on an SSE stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<Duration>,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    /// First frame on every stream: announces the connection id
    pub fn connection(connection_id: Uuid) -> Self {
        Self::new(
            EVENT_CONNECTION,
            json!({ "client_id": connection_id, "status": "connected" }).to_string(),
        )
    }

    /// Keep-alive frame with an empty payload
    pub fn ping() -> Self {
        Self::new(EVENT_PING, "")
    }

    pub fn is_ping(&self) -> bool {
        self.event == EVENT_PING
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the `text/event-stream` frame.
    ///
    /// Multi-line data becomes several `data:` lines. The event name and id
    /// must each fit on one line.
    pub fn to_frame(&self) -> Result<Event, FrameError> {
        validate_event_name(&self.event)?;

        let mut frame = Event::default().event(&self.event);
        if let Some(ref id) = self.id {
            single_line("id", id)?;
            frame = frame.id(id);
        }
        if let Some(retry) = self.retry {
            frame = frame.retry(retry);
        }

        // Both CR and LF break lines; fold CRLF so it counts once.
        let frame = if self.data.contains('\r') {
            frame.data(self.data.replace("\r\n", "\n").replace('\r', "\n"))
        } else {
            frame.data(&self.data)
        };
        Ok(frame)
    }
}

/// A message fanned out to every open stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Unique message id, carried as the SSE `id:` field
    pub id: Uuid,

    /// SSE event name
    pub event: String,

    /// JSON payload, serialized into the `data:` field
    pub payload: Value,

    /// Suggested reconnect interval in milliseconds
    pub retry_ms: u64,

    pub created_at: DateTime<Utc>,
}

impl BroadcastMessage {
    /// Create a message, rejecting event names that would break framing
    pub fn new(event: impl Into<String>, payload: Value) -> Result<Self, FrameError> {
        let event = event.into();
        validate_event_name(&event)?;

        Ok(Self {
            id: Uuid::new_v4(),
            event,
            payload,
            retry_ms: DEFAULT_RETRY.as_millis() as u64,
            created_at: Utc::now(),
        })
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry_ms = retry.as_millis() as u64;
        self
    }

    pub fn to_event(&self) -> SseEvent {
        SseEvent::new(self.event.clone(), self.payload.to_string())
            .with_id(self.id.to_string())
            .with_retry(Duration::from_millis(self.retry_ms))
    }
}
