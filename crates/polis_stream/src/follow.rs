//! Follower-set projection.

use serde::{Deserialize, Serialize};

use polis_protocol::events::{EVENT_FOLLOW_ANNOUNCED, EVENT_FOLLOW_REMOVED};
use polis_protocol::{Result, StreamEvent, StreamFilter};

use crate::handler::StreamHandler;

pub const FOLLOW_HANDLER: &str = "follow";

/// Who follows me, derived from follow announce/remove events targeting my
/// domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowState {
    pub count: usize,
    pub followers: Vec<String>,
}

pub struct FollowHandler {
    domain: String,
}

impl FollowHandler {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

impl StreamHandler for FollowHandler {
    fn name(&self) -> &'static str {
        FOLLOW_HANDLER
    }

    fn type_prefix(&self) -> &'static str {
        "polis.follow."
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[EVENT_FOLLOW_ANNOUNCED, EVENT_FOLLOW_REMOVED]
    }

    fn new_state(&self) -> serde_json::Value {
        serde_json::to_value(FollowState::default()).expect("follow state serializes")
    }

    fn stream_filter(&self, since: &str, limit: usize) -> StreamFilter {
        StreamFilter::new(since, limit)
            .with_type(self.type_prefix())
            .with_target(self.domain.clone())
    }

    fn process(
        &self,
        events: &[StreamEvent],
        state: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut follow_state: FollowState = serde_json::from_value(state)?;
        for event in events {
            if !self.handles(event) || !event.targets(&self.domain) {
                continue;
            }
            match event.event_type.as_str() {
                EVENT_FOLLOW_ANNOUNCED => {
                    if !follow_state.followers.contains(&event.actor) {
                        follow_state.followers.push(event.actor.clone());
                    }
                }
                EVENT_FOLLOW_REMOVED => {
                    follow_state.followers.retain(|f| f != &event.actor);
                }
                _ => {}
            }
        }
        follow_state.followers.sort();
        follow_state.count = follow_state.followers.len();
        Ok(serde_json::to_value(follow_state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(id: &str, event_type: &str, actor: &str, target: &str) -> StreamEvent {
        StreamEvent {
            id: id.into(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            actor: actor.into(),
            target: Some(target.into()),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_follow_and_unfollow() {
        let handler = FollowHandler::new("alice.example");
        let events = vec![
            event("1", EVENT_FOLLOW_ANNOUNCED, "bob.example", "alice.example"),
            event("2", EVENT_FOLLOW_ANNOUNCED, "carol.example", "alice.example"),
            event("3", EVENT_FOLLOW_REMOVED, "bob.example", "alice.example"),
        ];
        let state = handler.process(&events, handler.new_state()).unwrap();
        let follow_state: FollowState = serde_json::from_value(state).unwrap();
        assert_eq!(follow_state.count, 1);
        assert_eq!(follow_state.followers, vec!["carol.example"]);
    }

    #[test]
    fn test_events_for_other_targets_ignored() {
        let handler = FollowHandler::new("alice.example");
        let events = vec![event(
            "1",
            EVENT_FOLLOW_ANNOUNCED,
            "bob.example",
            "carol.example",
        )];
        let state = handler.process(&events, handler.new_state()).unwrap();
        let follow_state: FollowState = serde_json::from_value(state).unwrap();
        assert_eq!(follow_state.count, 0);
    }

    #[test]
    fn test_process_is_idempotent() {
        let handler = FollowHandler::new("alice.example");
        let events =
            vec![event("1", EVENT_FOLLOW_ANNOUNCED, "bob.example", "alice.example")];
        let once = handler.process(&events, handler.new_state()).unwrap();
        let twice = handler.process(&events, once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}
