//! Discovery stream event model.
//!
//! Events are immutable records on the global discovery log. The service
//! guarantees monotonic ordering per type prefix; cursors are opaque tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cursor value that replays the stream from the beginning.
pub const CURSOR_START: &str = "0";

// Concrete event types carried on the discovery log.
pub const EVENT_POST_PUBLISHED: &str = "polis.post.published";
pub const EVENT_FOLLOW_ANNOUNCED: &str = "polis.follow.announced";
pub const EVENT_FOLLOW_REMOVED: &str = "polis.follow.removed";
pub const EVENT_BLESSING_REQUESTED: &str = "polis.blessing.requested";
pub const EVENT_BLESSING_GRANTED: &str = "polis.blessing.granted";
pub const EVENT_BLESSING_DENIED: &str = "polis.blessing.denied";
pub const EVENT_BLESSING_REVOKED: &str = "polis.blessing.revoked";

/// One record on the discovery log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Domain that produced the event.
    pub actor: String,
    /// Domain the event is addressed to, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl StreamEvent {
    pub fn targets(&self, domain: &str) -> bool {
        self.target.as_deref() == Some(domain)
    }
}

/// StreamQuery response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamBatch {
    pub events: Vec<StreamEvent>,
    pub cursor: String,
    pub has_more: bool,
}

impl StreamBatch {
    pub fn empty(cursor: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            cursor: cursor.into(),
            has_more: false,
        }
    }
}

/// StreamQuery request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFilter {
    pub since: String,
    pub limit: usize,
    pub type_filter: Option<String>,
    pub actor_filter: Option<String>,
    pub target_filter: Option<String>,
}

impl StreamFilter {
    pub fn new(since: impl Into<String>, limit: usize) -> Self {
        Self {
            since: since.into(),
            limit,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_filter: impl Into<String>) -> Self {
        self.type_filter = Some(type_filter.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_filter = Some(target.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor_filter = Some(actor.into());
        self
    }
}
