//! Core artifact types for a Polis site.
//!
//! These mirror the on-disk formats byte-for-byte: field names and ordering
//! are part of the wire contract shared with peers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PolisError, Result};

/// .well-known/polis manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteManifest {
    pub site_title: String,
    pub author: String,
    pub email: String,
    pub public_key: String,
    pub base_url: String,
}

impl SiteManifest {
    /// Host portion of `base_url`, used as the site's domain identity on the
    /// discovery stream.
    pub fn domain(&self) -> Result<String> {
        domain_of(&self.base_url)
    }
}

/// Host portion of a site URL.
pub fn domain_of(base_url: &str) -> Result<String> {
    let parsed = url::Url::parse(base_url)
        .map_err(|e| PolisError::validation(format!("invalid site URL '{base_url}': {e}")))?;
    parsed
        .host_str()
        .map(|host| host.to_string())
        .ok_or_else(|| PolisError::validation(format!("site URL has no host: {base_url}")))
}

/// YAML frontmatter of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFrontmatter {
    pub title: String,
    pub published: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    /// hex(sha256(body after frontmatter)); identity across republishes.
    pub version: String,
}

/// YAML frontmatter of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentFrontmatter {
    pub id: String,
    /// Commenter's site URL.
    pub author: String,
    pub author_email: String,
    pub in_reply_to: String,
    pub root_post: String,
    pub comment_url: String,
    pub timestamp: DateTime<Utc>,
    pub comment_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_version: Option<String>,
}

/// Blessing lifecycle directories. A comment lives in exactly one at any
/// moment; transitions are renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentState {
    Pending,
    Blessed,
    Denied,
}

impl CommentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentState::Pending => "pending",
            CommentState::Blessed => "blessed",
            CommentState::Denied => "denied",
        }
    }

    pub const ALL: [CommentState; 3] = [
        CommentState::Pending,
        CommentState::Blessed,
        CommentState::Denied,
    ];
}

impl fmt::Display for CommentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommentState {
    type Err = PolisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(CommentState::Pending),
            "blessed" => Ok(CommentState::Blessed),
            "denied" => Ok(CommentState::Denied),
            other => Err(PolisError::validation(format!(
                "unknown comment state: {other}"
            ))),
        }
    }
}

/// One line of metadata/public.jsonl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIndexEntry {
    pub path: String,
    pub title: String,
    pub published: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    pub version: String,
}

/// A blessed third-party comment reference under one of my posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessingRef {
    pub url: String,
    pub version: String,
    pub blessed_at: DateTime<Utc>,
}

/// blessed-comments.json entry for one local post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessedPostEntry {
    pub post: String,
    pub blessed: Vec<BlessingRef>,
}

/// metadata/blessed-comments.json.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessedComments {
    /// Content hash of the index itself, recomputed on every write.
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub comments: Vec<BlessedPostEntry>,
}

impl BlessedComments {
    pub fn entry_for(&self, post: &str) -> Option<&BlessedPostEntry> {
        self.comments.iter().find(|entry| entry.post == post)
    }

    pub fn contains(&self, comment_url: &str) -> bool {
        self.comments
            .iter()
            .any(|entry| entry.blessed.iter().any(|r| r.url == comment_url))
    }
}

/// One entry of .polis/following.json. Metadata fields are lazily backfilled
/// from the peer's .well-known/polis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowedSite {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl FollowedSite {
    pub fn domain(&self) -> Result<String> {
        domain_of(&self.url)
    }

    pub fn needs_backfill(&self) -> bool {
        self.site_title.is_none() || self.author_name.is_none()
    }
}

/// A user-visible notification derived from stream events.
///
/// Ids are deterministic from the source event, so replays update an existing
/// notification instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub rule_id: String,
    pub icon: String,
    pub message: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}
