//! Background sync orchestration: event bus, SSE broadcast, periodic loop.

pub mod bus;
pub mod orchestrator;
pub mod sse;

pub use bus::{EventBus, HookSubscriber, LifecycleEvent, Subscriber};
pub use orchestrator::{sync_channel, Orchestrator, SyncHandle, TriggerSubscriber};
pub use sse::{encode_event, Broadcaster};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use std::sync::Arc;

    use polis_blessing::BlessingTransport;
    use polis_feed::FeedStore;
    use polis_fetch::PeerClient;
    use polis_follow::FollowStore;
    use polis_notify::NotificationStore;
    use polis_protocol::events::EVENT_FOLLOW_ANNOUNCED;
    use polis_protocol::{
        BeseechResponse, BlessingDecision, BlessingRequestPayload, BlessingVerdict, PolisError,
        PublicIndexEntry, Result, SiteManifest, SitePaths, StreamEvent,
    };
    use polis_security::SiteKeys;
    use polis_store::ContentStore;
    use polis_stream::{CheckpointStore, MemoryStreamSource};
    use tempfile::TempDir;

    struct NoBlessings;

    impl BlessingTransport for NoBlessings {
        async fn beseech(&self, _payload: &BlessingRequestPayload) -> Result<BeseechResponse> {
            Err(PolisError::remote("discovery", "not under test"))
        }

        async fn verdict(&self, _verdict: &BlessingVerdict) -> Result<()> {
            Ok(())
        }

        async fn revocation(&self, _comment_url: &str) -> Result<()> {
            Ok(())
        }

        async fn decisions(&self) -> Result<Vec<BlessingDecision>> {
            Ok(Vec::new())
        }
    }

    struct NoPeers;

    impl PeerClient for NoPeers {
        async fn fetch_manifest(&self, base_url: &str) -> Result<SiteManifest> {
            Err(PolisError::remote(base_url, "unreachable"))
        }

        async fn fetch_public_index(&self, base_url: &str) -> Result<Vec<PublicIndexEntry>> {
            Err(PolisError::remote(base_url, "unreachable"))
        }

        async fn fetch_markdown(&self, url: &str) -> Result<polis_fetch::Fetched> {
            Err(PolisError::remote(url, "unreachable"))
        }
    }

    fn orchestrator(
        temp: &TempDir,
        source: MemoryStreamSource,
    ) -> Arc<Orchestrator<MemoryStreamSource, NoBlessings, NoPeers>> {
        let paths = SitePaths::new(temp.path());
        let content = Arc::new(ContentStore::new(temp.path()));
        let keys = SiteKeys::generate(content.paths()).unwrap();
        Arc::new(Orchestrator::new(
            content,
            keys,
            "alice.example",
            "https://alice.example",
            Arc::new(CheckpointStore::new(paths.clone(), "alice.example")),
            Arc::new(FollowStore::new(paths.clone())),
            Arc::new(FeedStore::new(paths.clone())),
            Arc::new(NotificationStore::new(paths)),
            EventBus::new(),
            Broadcaster::new(),
            source,
            NoBlessings,
            NoPeers,
        ))
    }

    fn follow_event(id: usize) -> StreamEvent {
        StreamEvent {
            id: format!("e{id}"),
            timestamp: Utc::now(),
            event_type: EVENT_FOLLOW_ANNOUNCED.into(),
            actor: format!("peer{id}.example"),
            target: Some("alice.example".into()),
            payload: serde_json::Value::Null,
        }
    }

    fn stream_state_bytes(temp: &TempDir) -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        let root = temp.path().join(".polis/stream");
        for entry in walk(&root) {
            files.push((
                entry.to_string_lossy().into_owned(),
                fs::read(&entry).unwrap(),
            ));
        }
        files.sort();
        files
    }

    fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut out = Vec::new();
        if !dir.exists() {
            return out;
        }
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.extend(walk(&path));
            } else {
                out.push(path);
            }
        }
        out
    }

    #[tokio::test]
    async fn test_tick_builds_follower_counts_and_broadcasts() {
        let temp = TempDir::new().unwrap();
        let source = MemoryStreamSource::new();
        source.push(follow_event(1));
        source.push(follow_event(2));

        let orchestrator = orchestrator(&temp, source);
        let mut rx = orchestrator.broadcaster().subscribe();
        orchestrator.tick().await;

        let counts = orchestrator.counts();
        assert_eq!(counts.followers, 2);
        assert_eq!(counts.notifications_unread, 2); // two new-follower rules

        let frame = rx.recv().await.unwrap();
        assert!(frame.starts_with("event: counts\n"));
        assert!(frame.contains("\"followers\":2"));
    }

    #[tokio::test]
    async fn test_tick_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let source = MemoryStreamSource::new();
        source.push(follow_event(1));

        let orchestrator = orchestrator(&temp, source);
        orchestrator.tick().await;
        let state_once = stream_state_bytes(&temp);
        let notifications_once =
            fs::read(temp.path().join(".polis/notifications/notifications.json")).unwrap();

        orchestrator.tick().await;
        let state_twice = stream_state_bytes(&temp);
        let notifications_twice =
            fs::read(temp.path().join(".polis/notifications/notifications.json")).unwrap();

        assert_eq!(state_once, state_twice);
        assert_eq!(notifications_once, notifications_twice);
    }

    #[tokio::test]
    async fn test_counts_broadcast_only_on_change() {
        let temp = TempDir::new().unwrap();
        let source = MemoryStreamSource::new();
        let orchestrator = orchestrator(&temp, source.clone());

        let mut rx = orchestrator.broadcaster().subscribe();
        orchestrator.tick().await;
        assert!(rx.recv().await.is_some(), "first tick broadcasts");

        orchestrator.tick().await;
        assert!(
            rx.try_recv().is_err(),
            "unchanged counts must not rebroadcast"
        );

        source.push(follow_event(9));
        orchestrator.tick().await;
        let frame = rx.recv().await.unwrap();
        assert!(frame.contains("\"followers\":1"));
    }

    #[tokio::test]
    async fn test_replay_rebuilds_identical_follow_state() {
        let temp = TempDir::new().unwrap();
        let source = MemoryStreamSource::new();
        for i in 0..5 {
            source.push(follow_event(i));
        }
        let orchestrator = orchestrator(&temp, source);
        orchestrator.tick().await;
        let before = orchestrator.counts();

        // Wipe the follow projection and replay from cursor zero.
        orchestrator.run_projections(true).await;
        let after = orchestrator.counts();
        assert_eq!(before.followers, after.followers);
    }
}
