//! Server-sent-events broadcaster.
//!
//! A concurrent set of subscriber channels behind a mutex. Broadcast is
//! non-blocking fan-out; a subscriber that cannot keep up (full channel) or
//! has disconnected is dropped. The handler layer pipes frames straight into
//! a `text/event-stream` response body.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use polis_protocol::CountsSnapshot;

/// Frames buffered per subscriber before it counts as slow.
const SUBSCRIBER_BUFFER: usize = 8;

/// Encode one SSE frame.
pub fn encode_event(name: &str, data: &str) -> String {
    format!("event: {name}\ndata: {data}\n\n")
}

#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<String>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new SSE client.
    pub fn subscribe(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .lock()
            .expect("broadcaster lock poisoned")
            .push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("broadcaster lock poisoned")
            .len()
    }

    /// Fan a frame out to every subscriber, dropping slow or closed ones.
    pub fn broadcast(&self, name: &str, data: &str) {
        let frame = encode_event(name, data);
        let mut subscribers = self.subscribers.lock().expect("broadcaster lock poisoned");
        subscribers.retain(|tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("dropping slow SSE subscriber");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Broadcast the `counts` badge snapshot.
    pub fn broadcast_counts(&self, counts: &CountsSnapshot) {
        match serde_json::to_string(counts) {
            Ok(data) => self.broadcast("counts", &data),
            Err(err) => tracing::warn!(error = %err, "counts snapshot did not serialize"),
        }
    }
}
