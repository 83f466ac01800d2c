//! Typed API response shapes.
//!
//! The handler layer serializes these as-is; field names are the wire
//! contract with the web UI and CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generic mutation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Outcome of a lifecycle hook run, reported in-band and never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookOutcome {
    pub hook: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Response of publish_post / republish_post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    pub path: String,
    pub title: String,
    pub version: String,
    pub published: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookOutcome>,
}

/// Counts by category from a pending-comment sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub checked: usize,
    pub blessed: usize,
    pub denied: usize,
    pub still_pending: usize,
    pub errors: usize,
}

/// Badge counters broadcast as the `counts` SSE event. Reads of this never
/// fail; the orchestrator falls back to the last-known snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsSnapshot {
    pub posts: usize,
    pub comments_pending: usize,
    pub comments_blessed: usize,
    pub feed_unread: usize,
    pub feed_stale: bool,
    pub notifications_unread: usize,
    pub followers: usize,
    pub blessing_inbox: usize,
}

/// Per-author failure collected during feed aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorError {
    pub url: String,
    pub message: String,
}

/// Response of a feed refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRefreshResult {
    pub success: bool,
    pub new_items: usize,
    #[serde(default)]
    pub errors: Vec<AuthorError>,
}

/// Site directory classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Valid,
    Incomplete,
    Invalid,
    NotFound,
}

/// One finding from site validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCheck {
    pub code: String,
    pub path: String,
    pub suggestion: String,
}

/// Result of validate_site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteReport {
    pub status: SiteStatus,
    #[serde(default)]
    pub checks: Vec<SiteCheck>,
}

impl SiteReport {
    pub fn valid() -> Self {
        Self {
            status: SiteStatus::Valid,
            checks: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == SiteStatus::Valid
    }
}
