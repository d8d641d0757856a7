//! Registry of live SSE connections and broadcast fan-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SseConfig;

use super::event::{BroadcastMessage, SseEvent};

#[derive(Debug)]
struct Slot {
    sender: mpsc::Sender<SseEvent>,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    connections: Mutex<HashMap<Uuid, Slot>>,
    idle_timeout: Duration,
    retry: Duration,
    queue_capacity: usize,
}

impl Inner {
    // The map stays usable after a panicking holder.
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Slot>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: &Uuid) -> Option<Slot> {
        self.lock().remove(id)
    }
}

/// Tracks every open stream and fans broadcast messages out to them.
///
/// Cheap to clone; clones share the same connection set. The set lock is
/// only held for map updates and snapshots, never across an await.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(&SseConfig::default())
    }
}

impl ConnectionManager {
    pub fn new(config: &SseConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                connections: Mutex::new(HashMap::new()),
                idle_timeout: config.idle_timeout(),
                retry: config.retry(),
                queue_capacity: config.queue_capacity.max(1),
            }),
        }
    }

    /// Register a new stream. Its first queued event is the connection
    /// announcement.
    pub fn accept(&self) -> SseConnection {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let (sender, receiver) = mpsc::channel(self.inner.queue_capacity);

        // Fresh queue with capacity of at least one.
        let _ = sender.try_send(SseEvent::connection(id));

        let active = {
            let mut connections = self.inner.lock();
            connections.insert(id, Slot { sender, created_at });
            connections.len()
        };
        info!(connection_id = %id, active, "SSE client connected");

        SseConnection {
            id,
            created_at,
            receiver,
            manager: Arc::downgrade(&self.inner),
        }
    }

    /// Deregister a stream. Equivalent to dropping it.
    pub fn release(&self, connection: SseConnection) {
        drop(connection);
    }

    /// Queue a message on every open stream.
    ///
    /// Returns how many streams accepted it. A stream whose queue is full
    /// misses this message; other streams are unaffected.
    pub fn broadcast(&self, message: &BroadcastMessage) -> usize {
        let event = message.to_event();

        let targets: Vec<(Uuid, mpsc::Sender<SseEvent>)> = self
            .inner
            .lock()
            .iter()
            .map(|(id, slot)| (*id, slot.sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        connection_id = %id,
                        event = %message.event,
                        "SSE queue full, dropping message"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %id, "SSE client went away during broadcast");
                }
            }
        }

        info!(
            event = %message.event,
            message_id = %message.id,
            delivered,
            "broadcast sent"
        );
        delivered
    }

    /// Drop every registration. Open streams end at their next read and
    /// anything still queued for them is discarded.
    pub fn close_all(&self) -> usize {
        let closed = {
            let mut connections = self.inner.lock();
            let closed = connections.len();
            connections.clear();
            closed
        };
        if closed > 0 {
            info!(closed, "closed all SSE connections");
        }
        closed
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.inner.lock().contains_key(id)
    }

    /// Open connection ids, oldest first
    pub fn connection_ids(&self) -> Vec<Uuid> {
        let mut entries: Vec<(DateTime<Utc>, Uuid)> = self
            .inner
            .lock()
            .iter()
            .map(|(id, slot)| (slot.created_at, *id))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.inner.idle_timeout
    }

    pub fn retry(&self) -> Duration {
        self.inner.retry
    }
}

/// The receiving end of one registered stream.
///
/// Dropping it deregisters the stream, so a client disconnect releases its
/// slot exactly once however the stream ends.
#[derive(Debug)]
pub struct SseConnection {
    id: Uuid,
    created_at: DateTime<Utc>,
    receiver: mpsc::Receiver<SseEvent>,
    manager: Weak<Inner>,
}

impl SseConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Wait for the next frame.
    ///
    /// Yields a ping when nothing arrives within `idle`, and `None` once the
    /// stream has been deregistered. Events still queued at that point are
    /// never yielded.
    pub async fn next_event(&mut self, idle: Duration) -> Option<SseEvent> {
        let event = match tokio::time::timeout(idle, self.receiver.recv()).await {
            Ok(event) => event?,
            Err(_) => SseEvent::ping(),
        };
        self.is_registered().then_some(event)
    }

    /// Whether the manager still lists this stream
    pub fn is_registered(&self) -> bool {
        self.manager
            .upgrade()
            .is_some_and(|inner| inner.lock().contains_key(&self.id))
    }

    /// Turn the connection into a frame stream with idle pings
    pub fn into_stream(
        mut self,
        idle: Duration,
    ) -> impl Stream<Item = SseEvent> + Send + 'static {
        async_stream::stream! {
            while let Some(event) = self.next_event(idle).await {
                yield event;
            }
        }
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        if inner.remove(&self.id).is_some() {
            let lifetime = Utc::now() - self.created_at;
            info!(
                connection_id = %self.id,
                lifetime_secs = lifetime.num_seconds(),
                "SSE client disconnected"
            );
        }
    }
}
