//! Fan-out of lifecycle events to stream subscribers.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One framed server-sent event, payload already serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub event: &'static str,
    pub data: String,
}

impl StreamFrame {
    /// Builds a frame from a serializable payload. Serialization of these
    /// payloads cannot realistically fail; if it does, the frame degrades to
    /// an empty object and the error is logged.
    pub fn json<T: Serialize>(event: &'static str, payload: &T) -> Self {
        let data = serde_json::to_string(payload).unwrap_or_else(|e| {
            tracing::error!(error = %e, event, "Failed to encode stream event");
            "{}".to_string()
        });
        StreamFrame { event, data }
    }
}

/// Registry of live job-stream subscribers.
///
/// Delivery is best effort: each subscriber is an unbounded sender whose
/// receiver side feeds one SSE connection. A send to a gone receiver is
/// logged and the entry is cleaned up when the transport drops the
/// subscription.
#[derive(Debug, Default)]
pub struct JobEventHub {
    clients: Mutex<HashMap<Uuid, mpsc::UnboundedSender<StreamFrame>>>,
}

impl JobEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber; `init` is queued as its first frame.
    pub fn subscribe(&self, init: StreamFrame) -> (Uuid, mpsc::UnboundedReceiver<StreamFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let _ = tx.send(init);
        self.clients.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.clients.lock().unwrap().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn broadcast(&self, frame: StreamFrame) {
        let clients = self.clients.lock().unwrap();
        for (id, tx) in clients.iter() {
            if tx.send(frame.clone()).is_err() {
                tracing::debug!(client = %id, "Dropping event for stale subscriber");
            }
        }
    }
}
