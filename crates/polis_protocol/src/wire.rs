//! Cross-site wire payloads.
//!
//! Canonical JSON encoding matters here: the blessing request is signed over
//! its serialized bytes, and peers re-serialize to verify. Field order in
//! these structs IS the wire contract; do not reorder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PolisError, Result};

/// Blessing request, canonical key order:
/// comment_url, comment_version, in_reply_to, [in_reply_to_version],
/// root_post, author, timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessingRequestPayload {
    pub comment_url: String,
    pub comment_version: String,
    pub in_reply_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_version: Option<String>,
    pub root_post: String,
    /// Commenter's site URL.
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl BlessingRequestPayload {
    /// Serialize to the exact byte sequence that gets signed. serde_json
    /// preserves struct field order, which is the canonical order above.
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Synchronous answer to a beseech or a decision poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlessingStatus {
    Pending,
    Blessed,
    Denied,
}

impl BlessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlessingStatus::Pending => "pending",
            BlessingStatus::Blessed => "blessed",
            BlessingStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for BlessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlessingStatus {
    type Err = PolisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(BlessingStatus::Pending),
            "blessed" => Ok(BlessingStatus::Blessed),
            "denied" => Ok(BlessingStatus::Denied),
            other => Err(PolisError::validation(format!(
                "unknown blessing status: {other}"
            ))),
        }
    }
}

/// Response body of a beseech POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeseechResponse {
    pub status: BlessingStatus,
    #[serde(default)]
    pub message: String,
}

/// A blessing request waiting on a post author's decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBlessing {
    pub request: BlessingRequestPayload,
    /// Commenter's signature over the canonical request body.
    pub signature: String,
    pub received_at: DateTime<Utc>,
}

/// A decision the discovery service recorded for a comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlessingDecision {
    pub comment_url: String,
    pub status: BlessingStatus,
    pub decided_at: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
}

/// Grant/deny verdict a post author posts back to discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlessingVerdict {
    pub comment_url: String,
    pub comment_version: String,
    pub in_reply_to: String,
    pub status: BlessingStatus,
    pub timestamp: DateTime<Utc>,
}

impl BlessingVerdict {
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Site registration request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSitePayload {
    pub domain: String,
    pub email: String,
    pub author_name: String,
    pub public_key: String,
    pub timestamp: DateTime<Utc>,
}

impl RegisterSitePayload {
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
