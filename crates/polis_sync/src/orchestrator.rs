//! Background sync orchestrator.
//!
//! A single worker owns every derived cache: stream projections, pending
//! comment reconciliation, and feed refresh. Each tick runs the handlers in
//! dependency order, then broadcasts a `counts` SSE snapshot if anything
//! changed. Failures are logged and retried on the next tick; the cursor
//! discipline in the projector makes retries safe.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use polis_blessing::{BlessingEngine, BlessingTransport};
use polis_feed::{aggregate, FeedStore};
use polis_fetch::PeerClient;
use polis_follow::FollowStore;
use polis_notify::NotificationStore;
use polis_protocol::defaults::DEFAULT_SYNC_INTERVAL_SECS;
use polis_protocol::{CommentState, CountsSnapshot, HookOutcome};
use polis_security::SiteKeys;
use polis_store::ContentStore;
use polis_stream::{
    BlessingInboxHandler, CheckpointStore, FollowHandler, FollowState, InboxState,
    NotificationHandler, NotificationState, Projector, StreamSource, FOLLOW_HANDLER,
    INBOX_HANDLER, NOTIFICATION_HANDLER,
};

use crate::bus::{EventBus, LifecycleEvent, Subscriber};
use crate::sse::Broadcaster;

/// Requests an immediate sync tick; used by publish/bless/follow paths so
/// they don't wait out the periodic interval.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<()>,
}

impl SyncHandle {
    pub fn request_sync(&self) {
        // A full queue already has a tick coming.
        let _ = self.tx.try_send(());
    }
}

pub fn sync_channel() -> (SyncHandle, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(4);
    (SyncHandle { tx }, rx)
}

/// Subscriber that turns any lifecycle event into an immediate sync tick.
pub struct TriggerSubscriber {
    handle: SyncHandle,
}

impl TriggerSubscriber {
    pub fn new(handle: SyncHandle) -> Self {
        Self { handle }
    }
}

impl Subscriber for TriggerSubscriber {
    fn on_event(&self, _event: &LifecycleEvent) -> Option<HookOutcome> {
        self.handle.request_sync();
        None
    }
}

pub struct Orchestrator<S, B, P> {
    content: Arc<ContentStore>,
    keys: SiteKeys,
    domain: String,
    base_url: String,
    checkpoints: Arc<CheckpointStore>,
    follows: Arc<FollowStore>,
    feed: Arc<FeedStore>,
    notifications: Arc<NotificationStore>,
    bus: EventBus,
    broadcaster: Broadcaster,
    source: S,
    blessings: B,
    peer: P,
    interval: Duration,
    last_counts: Mutex<Option<CountsSnapshot>>,
}

impl<S, B, P> Orchestrator<S, B, P>
where
    S: StreamSource + Send + Sync,
    B: BlessingTransport + Send + Sync,
    P: PeerClient + Send + Sync,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        content: Arc<ContentStore>,
        keys: SiteKeys,
        domain: impl Into<String>,
        base_url: impl Into<String>,
        checkpoints: Arc<CheckpointStore>,
        follows: Arc<FollowStore>,
        feed: Arc<FeedStore>,
        notifications: Arc<NotificationStore>,
        bus: EventBus,
        broadcaster: Broadcaster,
        source: S,
        blessings: B,
        peer: P,
    ) -> Self {
        Self {
            content,
            keys,
            domain: domain.into(),
            base_url: base_url.into(),
            checkpoints,
            follows,
            feed,
            notifications,
            bus,
            broadcaster,
            source,
            blessings,
            peer,
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            last_counts: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// One full sync pass. Every step is independent; a failing step logs
    /// and leaves the rest of the tick running.
    pub async fn tick(&self) {
        self.run_projections(false).await;
        self.sync_pending_comments().await;
        self.refresh_feed_if_stale().await;
        self.publish_counts();
    }

    /// Stream handlers in dependency order: follow feeds the notification
    /// rule table, blessing-inbox is independent but kept last for stable
    /// counts.
    pub async fn run_projections(&self, refresh: bool) {
        let projector = Projector::new(&self.source, &self.checkpoints);

        let follow = FollowHandler::new(self.domain.clone());
        if let Err(err) = projector.run(&follow, refresh).await {
            tracing::warn!(handler = FOLLOW_HANDLER, error = %err, "projection failed");
        }

        let following = self.follows.followed_domains().unwrap_or_default();
        let notification = NotificationHandler::new(self.domain.clone(), following);
        match projector.run(&notification, refresh).await {
            Ok(_) => self.merge_notifications(),
            Err(err) => {
                tracing::warn!(handler = NOTIFICATION_HANDLER, error = %err, "projection failed")
            }
        }

        let inbox = BlessingInboxHandler::new(self.domain.clone());
        if let Err(err) = projector.run(&inbox, refresh).await {
            tracing::warn!(handler = INBOX_HANDLER, error = %err, "projection failed");
        }
    }

    fn merge_notifications(&self) {
        let state = match self
            .checkpoints
            .load_state::<NotificationState>(NOTIFICATION_HANDLER)
        {
            Ok(Some(state)) => state,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "notification state unreadable");
                return;
            }
        };
        match self.notifications.merge(&state.notifications) {
            Ok(added) if added > 0 => tracing::info!(added, "new notifications"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "notification merge failed"),
        }
    }

    async fn sync_pending_comments(&self) {
        let engine = BlessingEngine::new(&self.content, &self.keys, self.base_url.as_str());
        match engine.sync_pending(&self.blessings).await {
            Ok(outcome) => {
                for comment in outcome.newly_blessed {
                    self.bus.publish(&LifecycleEvent::CommentBlessed {
                        comment_url: comment.frontmatter.comment_url,
                        path: format!("comments/blessed/{}.md", comment.id),
                        version: comment.frontmatter.comment_version,
                    });
                }
            }
            Err(err) => tracing::warn!(error = %err, "pending comment sync failed"),
        }
    }

    async fn refresh_feed_if_stale(&self) {
        let cache = self.feed.load().unwrap_or_default();
        if !self.feed.is_stale(&cache) {
            return;
        }
        let following = self.follows.list().unwrap_or_default();
        let result = aggregate(&following, &self.peer, &cache).await;
        for error in &result.errors {
            tracing::debug!(url = %error.url, message = %error.message, "feed author error");
        }
        match self.feed.merge(result.items) {
            Ok(added) if added > 0 => tracing::info!(added, "new feed items"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "feed merge failed"),
        }
    }

    /// Badge counters. Never fails: unreadable stores fall back to the
    /// last-known snapshot.
    pub fn counts(&self) -> CountsSnapshot {
        let last = self
            .last_counts
            .lock()
            .expect("counts lock poisoned")
            .clone()
            .unwrap_or_default();
        let feed = self.feed.counts();
        CountsSnapshot {
            posts: self.content.count_posts().unwrap_or(last.posts),
            comments_pending: self
                .content
                .count_comments(CommentState::Pending)
                .unwrap_or(last.comments_pending),
            comments_blessed: self
                .content
                .count_comments(CommentState::Blessed)
                .unwrap_or(last.comments_blessed),
            feed_unread: feed.unread,
            feed_stale: feed.stale,
            notifications_unread: self
                .notifications
                .count_unread()
                .unwrap_or(last.notifications_unread),
            followers: self
                .checkpoints
                .load_state::<FollowState>(FOLLOW_HANDLER)
                .ok()
                .flatten()
                .map(|state| state.count)
                .unwrap_or(last.followers),
            blessing_inbox: self
                .checkpoints
                .load_state::<InboxState>(INBOX_HANDLER)
                .ok()
                .flatten()
                .map(|state| state.requests.len())
                .unwrap_or(last.blessing_inbox),
        }
    }

    fn publish_counts(&self) {
        let counts = self.counts();
        let mut last = self.last_counts.lock().expect("counts lock poisoned");
        if last.as_ref() == Some(&counts) {
            return;
        }
        *last = Some(counts.clone());
        drop(last);
        self.broadcaster.broadcast_counts(&counts);
    }

    /// Periodic loop. Ad-hoc triggers cut the wait short; the shutdown
    /// signal flushes one final tick before exiting.
    pub async fn run(
        self: Arc<Self>,
        mut trigger_rx: mpsc::Receiver<()>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "sync orchestrator started");
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                Some(()) = trigger_rx.recv() => self.tick().await,
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        self.tick().await;
                        break;
                    }
                }
            }
        }
        tracing::info!("sync orchestrator stopped");
    }
}
