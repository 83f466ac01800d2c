//! Application context: dependency-injected composition of every subsystem
//! store for one site directory. No globals; handlers and the orchestrator
//! borrow what they need from here.

use std::path::Path;
use std::sync::Arc;

use polis_blessing::{BeseechOutcome, BlessingEngine, BlessingTransport, CommentDraft};
use polis_feed::FeedStore;
use polis_follow::FollowStore;
use polis_hooks::{HookRunner, HOOK_POST_COMMENT, HOOK_POST_PUBLISH, HOOK_POST_REPUBLISH};
use polis_notify::NotificationStore;
use polis_protocol::{
    BlessingStatus, PolisError, PublishResult, Result, SiteConfig, SiteManifest, SitePaths,
    SiteReport,
};
use polis_security::SiteKeys;
use polis_store::ContentStore;
use polis_stream::CheckpointStore;
use polis_sync::{EventBus, HookSubscriber, LifecycleEvent};

use crate::config;

pub struct AppContext {
    paths: SitePaths,
    pub content: Arc<ContentStore>,
    pub keys: SiteKeys,
    pub manifest: SiteManifest,
    pub domain: String,
    pub config: SiteConfig,
    pub checkpoints: Arc<CheckpointStore>,
    pub follows: Arc<FollowStore>,
    pub feed: Arc<FeedStore>,
    pub notifications: Arc<NotificationStore>,
    pub bus: EventBus,
}

impl AppContext {
    /// Open an existing site directory. The site must validate; the hook
    /// runner is subscribed to the lifecycle bus up front.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let content = Arc::new(ContentStore::new(root));
        let report = content.validate_site()?;
        if !report.is_valid() {
            let detail = report
                .checks
                .first()
                .map(|check| format!("{}: {}", check.code, check.suggestion))
                .unwrap_or_else(|| "site directory failed validation".to_string());
            return Err(PolisError::not_configured(detail));
        }

        let paths = SitePaths::new(root);
        let keys = SiteKeys::load(&paths)?;
        let manifest = content.read_manifest()?;
        let domain = manifest.domain()?;
        let config = config::load_config(&paths)?;

        let bus = EventBus::new();
        bus.subscribe(Arc::new(HookSubscriber::new(HookRunner::new(
            paths.clone(),
            config.hooks.clone(),
        ))));

        Ok(Self {
            content,
            keys,
            domain: domain.clone(),
            manifest,
            config,
            checkpoints: Arc::new(CheckpointStore::new(paths.clone(), domain)),
            follows: Arc::new(FollowStore::new(paths.clone())),
            feed: Arc::new(FeedStore::new(paths.clone())),
            notifications: Arc::new(NotificationStore::new(paths.clone())),
            bus,
            paths,
        })
    }

    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }

    pub fn validate(&self) -> Result<SiteReport> {
        self.content.validate_site()
    }

    /// Publish raw Markdown and fire the post-publish hook, reporting its
    /// outcome in-band.
    pub fn publish_post(&self, body: &str, filename: Option<&str>) -> Result<PublishResult> {
        let mut result = self.content.publish_post(body, filename, &self.keys)?;
        let outcomes = self.bus.publish(&LifecycleEvent::PostPublished {
            path: result.path.clone(),
            title: result.title.clone(),
            version: result.version.clone(),
        });
        result.hook = outcomes.into_iter().find(|o| o.hook == HOOK_POST_PUBLISH);
        Ok(result)
    }

    pub fn republish_post(&self, rel_path: &str, body: &str) -> Result<PublishResult> {
        let mut result = self.content.republish_post(rel_path, body, &self.keys)?;
        let outcomes = self.bus.publish(&LifecycleEvent::PostRepublished {
            path: result.path.clone(),
            title: result.title.clone(),
            version: result.version.clone(),
        });
        result.hook = outcomes.into_iter().find(|o| o.hook == HOOK_POST_REPUBLISH);
        Ok(result)
    }

    pub fn blessing_engine(&self) -> BlessingEngine<'_> {
        BlessingEngine::new(&self.content, &self.keys, self.manifest.base_url.as_str())
    }

    /// Sign a comment draft and beseech the target author in one step.
    pub async fn comment<T: BlessingTransport>(
        &self,
        draft: &CommentDraft,
        transport: &T,
    ) -> Result<BeseechOutcome> {
        let engine = self.blessing_engine();
        let signed = engine.sign_comment(draft, &self.manifest.email)?;
        let outcome = engine.beseech_comment(&signed.id, transport).await?;
        if outcome.status == BlessingStatus::Blessed {
            self.bus.publish(&LifecycleEvent::CommentBlessed {
                comment_url: outcome.comment_url.clone(),
                path: format!("comments/blessed/{}.md", signed.id),
                version: signed.comment_version.clone(),
            });
        }
        Ok(outcome)
    }

    /// Bless a third-party comment on one of my posts and fire the
    /// post-comment hook.
    pub async fn grant_blessing<T: BlessingTransport>(
        &self,
        version: &str,
        comment_url: &str,
        in_reply_to: &str,
        transport: &T,
    ) -> Result<Option<polis_protocol::HookOutcome>> {
        self.blessing_engine()
            .grant_by_version(version, comment_url, in_reply_to, transport)
            .await?;
        let path = in_reply_to
            .strip_prefix(&format!("{}/", self.manifest.base_url))
            .unwrap_or(in_reply_to)
            .to_string();
        let outcomes = self.bus.publish(&LifecycleEvent::CommentBlessed {
            comment_url: comment_url.to_string(),
            path,
            version: version.to_string(),
        });
        Ok(outcomes.into_iter().find(|o| o.hook == HOOK_POST_COMMENT))
    }

    pub async fn deny_blessing<T: BlessingTransport>(
        &self,
        comment_url: &str,
        in_reply_to: &str,
        transport: &T,
    ) -> Result<()> {
        self.blessing_engine()
            .deny(comment_url, in_reply_to, transport)
            .await
    }

    pub async fn revoke_blessing<T: BlessingTransport>(
        &self,
        comment_url: &str,
        transport: &T,
    ) -> Result<()> {
        self.blessing_engine().revoke(comment_url, transport).await
    }

    /// Follow an author; the bus turns this into an immediate sync tick.
    pub async fn follow<P, T>(
        &self,
        url: &str,
        peer: &P,
        transport: &T,
    ) -> Result<polis_follow::FollowOutcome>
    where
        P: polis_fetch::PeerClient,
        T: polis_follow::FollowTransport,
    {
        let outcome = self
            .follows
            .follow(url, peer, transport, &self.content)
            .await?;
        self.bus
            .publish(&LifecycleEvent::FollowChanged { url: url.to_string() });
        Ok(outcome)
    }

    pub async fn unfollow<T>(&self, url: &str, transport: &T) -> Result<polis_follow::UnfollowOutcome>
    where
        T: polis_follow::FollowTransport,
    {
        let outcome = self.follows.unfollow(url, transport, &self.content).await?;
        self.bus
            .publish(&LifecycleEvent::FollowChanged { url: url.to_string() });
        Ok(outcome)
    }
}
