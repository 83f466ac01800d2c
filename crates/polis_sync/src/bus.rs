//! Typed lifecycle event bus.
//!
//! Content mutations publish events; subscribers (the hook runner, the sync
//! trigger) react in registration order. Subscribers may report a hook
//! outcome so operations can surface it in-band.

use std::sync::{Arc, RwLock};

use polis_hooks::{HookPayload, HookRunner, HOOK_POST_COMMENT, HOOK_POST_PUBLISH, HOOK_POST_REPUBLISH};
use polis_protocol::HookOutcome;

/// A content lifecycle event.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    PostPublished {
        path: String,
        title: String,
        version: String,
    },
    PostRepublished {
        path: String,
        title: String,
        version: String,
    },
    CommentBlessed {
        comment_url: String,
        path: String,
        version: String,
    },
    /// Follow set changed; no hook, but sync should run now.
    FollowChanged {
        url: String,
    },
}

impl LifecycleEvent {
    /// Hook this event maps to, when any.
    pub fn hook_name(&self) -> Option<&'static str> {
        match self {
            LifecycleEvent::PostPublished { .. } => Some(HOOK_POST_PUBLISH),
            LifecycleEvent::PostRepublished { .. } => Some(HOOK_POST_REPUBLISH),
            LifecycleEvent::CommentBlessed { .. } => Some(HOOK_POST_COMMENT),
            LifecycleEvent::FollowChanged { .. } => None,
        }
    }

    fn hook_payload(&self) -> HookPayload {
        match self {
            LifecycleEvent::PostPublished {
                path,
                title,
                version,
            } => HookPayload {
                path: path.clone(),
                title: title.clone(),
                version: version.clone(),
                commit_message: format!("publish: {title}"),
            },
            LifecycleEvent::PostRepublished {
                path,
                title,
                version,
            } => HookPayload {
                path: path.clone(),
                title: title.clone(),
                version: version.clone(),
                commit_message: format!("republish: {title}"),
            },
            LifecycleEvent::CommentBlessed {
                comment_url,
                path,
                version,
            } => HookPayload {
                path: path.clone(),
                title: comment_url.clone(),
                version: version.clone(),
                commit_message: "comment blessed".to_string(),
            },
            LifecycleEvent::FollowChanged { .. } => HookPayload::default(),
        }
    }
}

pub trait Subscriber: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent) -> Option<HookOutcome>;
}

#[derive(Default, Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn Subscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers
            .write()
            .expect("bus lock poisoned")
            .push(subscriber);
    }

    /// Fan out to every subscriber in registration order, collecting any
    /// hook outcomes for in-band reporting.
    pub fn publish(&self, event: &LifecycleEvent) -> Vec<HookOutcome> {
        let subscribers = self.subscribers.read().expect("bus lock poisoned").clone();
        subscribers
            .iter()
            .filter_map(|subscriber| subscriber.on_event(event))
            .collect()
    }
}

/// Bridges lifecycle events to the shell-script hook runner.
pub struct HookSubscriber {
    runner: HookRunner,
}

impl HookSubscriber {
    pub fn new(runner: HookRunner) -> Self {
        Self { runner }
    }
}

impl Subscriber for HookSubscriber {
    fn on_event(&self, event: &LifecycleEvent) -> Option<HookOutcome> {
        let hook = event.hook_name()?;
        let outcome = self.runner.run(hook, &event.hook_payload());
        if let Some(outcome) = &outcome {
            if !outcome.success {
                tracing::warn!(hook = %outcome.hook, message = %outcome.message, "hook failed");
            }
        }
        outcome
    }
}
