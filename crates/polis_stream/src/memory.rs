//! In-memory stream source.
//!
//! Backs projector tests and local tooling; the cursor is the scan position
//! in the underlying log, which keeps ordering semantics identical to the
//! discovery service (monotonic, opaque to handlers).

use std::sync::{Arc, Mutex};

use polis_protocol::{Result, StreamBatch, StreamEvent, StreamFilter};

use crate::source::StreamSource;

#[derive(Debug, Clone, Default)]
pub struct MemoryStreamSource {
    inner: Arc<Mutex<Vec<StreamEvent>>>,
}

impl MemoryStreamSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: StreamEvent) {
        self.inner.lock().expect("stream lock poisoned").push(event);
    }

    pub fn extend(&self, events: impl IntoIterator<Item = StreamEvent>) {
        self.inner
            .lock()
            .expect("stream lock poisoned")
            .extend(events);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("stream lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches(filter: &StreamFilter, event: &StreamEvent) -> bool {
    if let Some(type_filter) = &filter.type_filter {
        if !event.event_type.starts_with(type_filter.as_str()) {
            return false;
        }
    }
    if let Some(actor) = &filter.actor_filter {
        if &event.actor != actor {
            return false;
        }
    }
    if let Some(target) = &filter.target_filter {
        if event.target.as_deref() != Some(target.as_str()) {
            return false;
        }
    }
    true
}

impl StreamSource for MemoryStreamSource {
    async fn query(&self, filter: &StreamFilter) -> Result<StreamBatch> {
        let log = self.inner.lock().expect("stream lock poisoned").clone();
        let start: usize = filter.since.parse().unwrap_or(0);
        let limit = filter.limit.max(1);

        let mut events = Vec::new();
        let mut scanned = start.min(log.len());
        for (index, event) in log.iter().enumerate().skip(start) {
            scanned = index + 1;
            if matches(filter, event) {
                events.push(event.clone());
                if events.len() == limit {
                    break;
                }
            }
        }
        let has_more = log.iter().skip(scanned).any(|event| matches(filter, event));
        Ok(StreamBatch {
            events,
            cursor: scanned.to_string(),
            has_more,
        })
    }
}
