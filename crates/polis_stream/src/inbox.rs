//! Blessing-inbox projection: requests waiting on my decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use polis_protocol::events::{
    EVENT_BLESSING_DENIED, EVENT_BLESSING_GRANTED, EVENT_BLESSING_REQUESTED,
    EVENT_BLESSING_REVOKED,
};
use polis_protocol::{Result, StreamEvent};

use crate::handler::StreamHandler;

pub const INBOX_HANDLER: &str = "blessing-inbox";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxRequest {
    pub comment_url: String,
    pub in_reply_to: String,
    pub author_domain: String,
    pub requested_at: DateTime<Utc>,
    pub event_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxState {
    pub requests: Vec<InboxRequest>,
}

pub struct BlessingInboxHandler {
    domain: String,
}

impl BlessingInboxHandler {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

impl StreamHandler for BlessingInboxHandler {
    fn name(&self) -> &'static str {
        INBOX_HANDLER
    }

    fn type_prefix(&self) -> &'static str {
        "polis.blessing."
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[
            EVENT_BLESSING_REQUESTED,
            EVENT_BLESSING_GRANTED,
            EVENT_BLESSING_DENIED,
            EVENT_BLESSING_REVOKED,
        ]
    }

    fn new_state(&self) -> serde_json::Value {
        serde_json::to_value(InboxState::default()).expect("inbox state serializes")
    }

    fn process(
        &self,
        events: &[StreamEvent],
        state: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut inbox: InboxState = serde_json::from_value(state)?;
        for event in events {
            if !self.handles(event) {
                continue;
            }
            let comment_url = event
                .payload
                .get("comment_url")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            match event.event_type.as_str() {
                EVENT_BLESSING_REQUESTED if event.targets(&self.domain) => {
                    if comment_url.is_empty()
                        || inbox.requests.iter().any(|r| r.comment_url == comment_url)
                    {
                        continue;
                    }
                    inbox.requests.push(InboxRequest {
                        comment_url,
                        in_reply_to: event
                            .payload
                            .get("in_reply_to")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        author_domain: event.actor.clone(),
                        requested_at: event.timestamp,
                        event_id: event.id.clone(),
                    });
                }
                // My own verdicts clear the request.
                EVENT_BLESSING_GRANTED | EVENT_BLESSING_DENIED | EVENT_BLESSING_REVOKED
                    if event.actor == self.domain =>
                {
                    inbox.requests.retain(|r| r.comment_url != comment_url);
                }
                _ => {}
            }
        }
        Ok(serde_json::to_value(inbox)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(
        id: &str,
        event_type: &str,
        actor: &str,
        target: Option<&str>,
        comment_url: &str,
    ) -> StreamEvent {
        StreamEvent {
            id: id.into(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            actor: actor.into(),
            target: target.map(String::from),
            payload: serde_json::json!({
                "comment_url": comment_url,
                "in_reply_to": "https://alice.example/posts/20250101/x.md",
            }),
        }
    }

    fn state_of(value: serde_json::Value) -> InboxState {
        serde_json::from_value(value).unwrap()
    }

    const COMMENT: &str = "https://bob.example/comments/20250102/abc.md";

    #[test]
    fn test_request_enters_inbox() {
        let handler = BlessingInboxHandler::new("alice.example");
        let events = vec![event(
            "e1",
            EVENT_BLESSING_REQUESTED,
            "bob.example",
            Some("alice.example"),
            COMMENT,
        )];
        let state = state_of(handler.process(&events, handler.new_state()).unwrap());
        assert_eq!(state.requests.len(), 1);
        assert_eq!(state.requests[0].author_domain, "bob.example");
    }

    #[test]
    fn test_own_grant_clears_request() {
        let handler = BlessingInboxHandler::new("alice.example");
        let events = vec![
            event(
                "e1",
                EVENT_BLESSING_REQUESTED,
                "bob.example",
                Some("alice.example"),
                COMMENT,
            ),
            event(
                "e2",
                EVENT_BLESSING_GRANTED,
                "alice.example",
                Some("bob.example"),
                COMMENT,
            ),
        ];
        let state = state_of(handler.process(&events, handler.new_state()).unwrap());
        assert!(state.requests.is_empty());
    }

    #[test]
    fn test_requests_for_other_domains_ignored() {
        let handler = BlessingInboxHandler::new("alice.example");
        let events = vec![event(
            "e1",
            EVENT_BLESSING_REQUESTED,
            "bob.example",
            Some("carol.example"),
            COMMENT,
        )];
        let state = state_of(handler.process(&events, handler.new_state()).unwrap());
        assert!(state.requests.is_empty());
    }

    #[test]
    fn test_duplicate_requests_collapse() {
        let handler = BlessingInboxHandler::new("alice.example");
        let events = vec![
            event(
                "e1",
                EVENT_BLESSING_REQUESTED,
                "bob.example",
                Some("alice.example"),
                COMMENT,
            ),
            event(
                "e2",
                EVENT_BLESSING_REQUESTED,
                "bob.example",
                Some("alice.example"),
                COMMENT,
            ),
        ];
        let state = state_of(handler.process(&events, handler.new_state()).unwrap());
        assert_eq!(state.requests.len(), 1);
    }
}
