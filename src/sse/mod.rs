//! Server-sent events transport.
//!
//! Each `GET /sse` client gets its own bounded queue registered with the
//! [`ConnectionManager`]. Broadcasts are copied onto every queue; a stream
//! that has seen no traffic for the idle timeout receives a `ping` frame.

mod event;
mod manager;

pub use event::{
    validate_event_name, BroadcastMessage, FrameError, SseEvent, DEFAULT_RETRY, EVENT_CONNECTION,
    EVENT_PING,
};
pub use manager::{ConnectionManager, SseConnection};
