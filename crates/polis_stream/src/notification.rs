//! Notification derivation from stream events.
//!
//! A rule table maps events to user-visible notifications. Notification ids
//! are deterministic from the source event id, so replaying the stream
//! updates message/payload in place instead of duplicating entries. Read
//! state is owned by the notification store, not this projection.

use serde::{Deserialize, Serialize};

use polis_protocol::events::{
    EVENT_BLESSING_DENIED, EVENT_BLESSING_GRANTED, EVENT_BLESSING_REQUESTED,
    EVENT_FOLLOW_ANNOUNCED, EVENT_POST_PUBLISHED,
};
use polis_protocol::{Notification, Result, StreamEvent};
use polis_security::short_hash;

use crate::handler::StreamHandler;

pub const NOTIFICATION_HANDLER: &str = "notification";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
}

pub struct NotificationHandler {
    domain: String,
    /// Followed domains snapshot, used by the post-published rule.
    following: Vec<String>,
}

impl NotificationHandler {
    pub fn new(domain: impl Into<String>, following: Vec<String>) -> Self {
        Self {
            domain: domain.into(),
            following,
        }
    }

    /// Apply the rule table to one event.
    fn derive(&self, event: &StreamEvent) -> Option<Notification> {
        let (rule_id, icon, message, link) = match event.event_type.as_str() {
            EVENT_FOLLOW_ANNOUNCED if event.targets(&self.domain) => (
                "new-follower",
                "user-plus",
                format!("{} followed you", event.actor),
                None,
            ),
            EVENT_POST_PUBLISHED if self.following.contains(&event.actor) => (
                "post-published",
                "file-text",
                format!("New post from {}", event.actor),
                event.payload.get("url").and_then(|v| v.as_str()).map(String::from),
            ),
            EVENT_BLESSING_REQUESTED if event.targets(&self.domain) => (
                "blessing-requested",
                "message-circle",
                format!("{} requested a blessing on your post", event.actor),
                event
                    .payload
                    .get("in_reply_to")
                    .and_then(|v| v.as_str())
                    .map(String::from),
            ),
            EVENT_BLESSING_GRANTED if event.targets(&self.domain) => (
                "blessing-granted",
                "check-circle",
                format!("{} blessed your comment", event.actor),
                event
                    .payload
                    .get("comment_url")
                    .and_then(|v| v.as_str())
                    .map(String::from),
            ),
            EVENT_BLESSING_DENIED if event.targets(&self.domain) => (
                "blessing-denied",
                "x-circle",
                format!("{} declined to bless your comment", event.actor),
                None,
            ),
            _ => return None,
        };
        Some(Notification {
            id: notification_id(rule_id, &event.id),
            rule_id: rule_id.to_string(),
            icon: icon.to_string(),
            message,
            payload: event.payload.clone(),
            created_at: event.timestamp,
            read_at: None,
            link,
        })
    }
}

/// Deterministic id: the same event always maps to the same notification.
pub fn notification_id(rule_id: &str, event_id: &str) -> String {
    short_hash(&[rule_id, event_id])
}

impl StreamHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        NOTIFICATION_HANDLER
    }

    fn type_prefix(&self) -> &'static str {
        "polis."
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[
            EVENT_FOLLOW_ANNOUNCED,
            EVENT_POST_PUBLISHED,
            EVENT_BLESSING_REQUESTED,
            EVENT_BLESSING_GRANTED,
            EVENT_BLESSING_DENIED,
        ]
    }

    fn new_state(&self) -> serde_json::Value {
        serde_json::to_value(NotificationState::default()).expect("notification state serializes")
    }

    fn process(
        &self,
        events: &[StreamEvent],
        state: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut notif_state: NotificationState = serde_json::from_value(state)?;
        for event in events {
            if !self.handles(event) {
                continue;
            }
            let Some(derived) = self.derive(event) else {
                continue;
            };
            match notif_state
                .notifications
                .iter_mut()
                .find(|n| n.id == derived.id)
            {
                // Replays refresh content only; created_at stays put and
                // read state lives elsewhere.
                Some(existing) => {
                    existing.message = derived.message;
                    existing.payload = derived.payload;
                }
                None => notif_state.notifications.push(derived),
            }
        }
        Ok(serde_json::to_value(notif_state)?)
    }
}
