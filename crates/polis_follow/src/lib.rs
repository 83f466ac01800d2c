//! Following list and follow/unfollow flows.
//!
//! The local follow set lives in .polis/following.json. Following an author
//! re-blesses their previously denied comments; unfollowing demotes their
//! blessed comments. Follower counts flow the other way, derived from the
//! discovery stream by the follow projection.

use chrono::Utc;
use std::fs;
use std::future::Future;
use std::sync::Mutex;

use polis_discovery::AuthedDiscovery;
use polis_fetch::PeerClient;
use polis_protocol::defaults::FOLLOW_BACKFILL_CAP;
use polis_protocol::{
    domain_of, BlessingRef, CommentState, FollowedSite, PolisError, Result, SitePaths,
};
use polis_store::{fsutil, ContentStore};

/// Discovery-side announcements the flows need. Tests use an in-memory
/// implementation.
pub trait FollowTransport {
    fn follow_announced(
        &self,
        target_domain: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn follow_removed(&self, target_domain: &str) -> impl Future<Output = Result<()>> + Send;
}

impl FollowTransport for AuthedDiscovery {
    async fn follow_announced(&self, target_domain: &str) -> Result<()> {
        self.announce_follow(target_domain).await.map(|_| ())
    }

    async fn follow_removed(&self, target_domain: &str) -> Result<()> {
        self.announce_unfollow(target_domain).await.map(|_| ())
    }
}

/// Outcome of a follow mutation.
#[derive(Debug, Clone, Default)]
pub struct FollowOutcome {
    /// Comments from this author moved denied -> blessed.
    pub reblessed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UnfollowOutcome {
    /// Comments from this author moved blessed -> denied.
    pub demoted: usize,
}

#[derive(Debug)]
pub struct FollowStore {
    paths: SitePaths,
    lock: Mutex<()>,
}

impl FollowStore {
    pub fn new(paths: SitePaths) -> Self {
        Self {
            paths,
            lock: Mutex::new(()),
        }
    }

    pub fn list(&self) -> Result<Vec<FollowedSite>> {
        let path = self.paths.following_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Domains of every followed site, for the notification rule table.
    pub fn followed_domains(&self) -> Result<Vec<String>> {
        Ok(self
            .list()?
            .iter()
            .filter_map(|site| site.domain().ok())
            .collect())
    }

    pub fn is_followed(&self, url: &str) -> Result<bool> {
        let url = normalize_url(url);
        Ok(self.list()?.iter().any(|site| site.url == url))
    }

    /// Follow an author: resolve metadata, record locally, announce, and
    /// re-bless their previously denied comments.
    pub async fn follow<P, T>(
        &self,
        url: &str,
        peer: &P,
        transport: &T,
        content: &ContentStore,
    ) -> Result<FollowOutcome>
    where
        P: PeerClient,
        T: FollowTransport,
    {
        let url = normalize_url(url);
        let domain = domain_of(&url)?;
        if self.is_followed(&url)? {
            return Err(PolisError::conflict(format!("already following {url}")));
        }

        // Metadata is best-effort here; the lazy backfill pass fills gaps.
        let (site_title, author_name) = match peer.fetch_manifest(&url).await {
            Ok(manifest) => (Some(manifest.site_title), Some(manifest.author)),
            Err(err) => {
                tracing::warn!(%url, error = %err, "could not resolve manifest on follow");
                (None, None)
            }
        };

        {
            let _guard = self.lock.lock().expect("following lock poisoned");
            let mut list = self.list()?;
            list.push(FollowedSite {
                url: url.clone(),
                site_title,
                author_name,
                added_at: Utc::now(),
            });
            self.write(&list)?;
        }

        transport.follow_announced(&domain).await?;

        let reblessed = self.rebless_denied(&url, content)?;
        tracing::info!(%url, reblessed, "followed author");
        Ok(FollowOutcome { reblessed })
    }

    /// Unfollow an author: remove locally, announce, and demote their
    /// blessed comments.
    pub async fn unfollow<T>(
        &self,
        url: &str,
        transport: &T,
        content: &ContentStore,
    ) -> Result<UnfollowOutcome>
    where
        T: FollowTransport,
    {
        let url = normalize_url(url);
        let domain = domain_of(&url)?;

        {
            let _guard = self.lock.lock().expect("following lock poisoned");
            let mut list = self.list()?;
            let before = list.len();
            list.retain(|site| site.url != url);
            if list.len() == before {
                return Err(PolisError::not_found(format!("not following {url}")));
            }
            self.write(&list)?;
        }

        transport.follow_removed(&domain).await?;

        let demoted = self.demote_blessed(&url, content)?;
        tracing::info!(%url, demoted, "unfollowed author");
        Ok(UnfollowOutcome { demoted })
    }

    /// Fill missing site_title/author_name from peers' manifests, capped per
    /// call to bound request latency.
    pub async fn backfill_metadata<P: PeerClient>(&self, peer: &P) -> Result<usize> {
        let list = self.list()?;
        let mut updates = Vec::new();
        for site in list.iter().filter(|site| site.needs_backfill()) {
            if updates.len() >= FOLLOW_BACKFILL_CAP {
                break;
            }
            match peer.fetch_manifest(&site.url).await {
                Ok(manifest) => {
                    updates.push((site.url.clone(), manifest.site_title, manifest.author));
                }
                Err(err) => {
                    tracing::debug!(url = %site.url, error = %err, "metadata backfill failed");
                }
            }
        }
        if updates.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.lock().expect("following lock poisoned");
        let mut list = self.list()?;
        let mut changed = 0;
        for (url, site_title, author_name) in updates {
            if let Some(site) = list.iter_mut().find(|site| site.url == url) {
                site.site_title = Some(site_title);
                site.author_name = Some(author_name);
                changed += 1;
            }
        }
        self.write(&list)?;
        Ok(changed)
    }

    fn rebless_denied(&self, author_url: &str, content: &ContentStore) -> Result<usize> {
        let mut moved = 0;
        for comment in content.list_comments(CommentState::Denied)? {
            if normalize_url(&comment.frontmatter.author) != author_url {
                continue;
            }
            content.move_comment(&comment.id, CommentState::Denied, CommentState::Blessed)?;
            content.add_blessing(
                &comment.frontmatter.in_reply_to,
                BlessingRef {
                    url: comment.frontmatter.comment_url.clone(),
                    version: comment.frontmatter.comment_version.clone(),
                    blessed_at: Utc::now(),
                },
            )?;
            moved += 1;
        }
        Ok(moved)
    }

    fn demote_blessed(&self, author_url: &str, content: &ContentStore) -> Result<usize> {
        let mut moved = 0;
        for comment in content.list_comments(CommentState::Blessed)? {
            if normalize_url(&comment.frontmatter.author) != author_url {
                continue;
            }
            content.move_comment(&comment.id, CommentState::Blessed, CommentState::Denied)?;
            content.remove_blessing(&comment.frontmatter.comment_url)?;
            moved += 1;
        }
        Ok(moved)
    }

    fn write(&self, list: &[FollowedSite]) -> Result<()> {
        let raw = serde_json::to_string_pretty(list)?;
        fsutil::write_atomic_str(&self.paths.following_file(), &raw)?;
        Ok(())
    }
}

fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polis_protocol::{PublicIndexEntry, SiteManifest};
    use polis_security::SiteKeys;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StaticPeer {
        manifest: Option<SiteManifest>,
    }

    impl PeerClient for StaticPeer {
        async fn fetch_manifest(&self, _base_url: &str) -> Result<SiteManifest> {
            self.manifest
                .clone()
                .ok_or_else(|| PolisError::remote("peer", "unreachable"))
        }

        async fn fetch_public_index(&self, _base_url: &str) -> Result<Vec<PublicIndexEntry>> {
            Ok(Vec::new())
        }

        async fn fetch_markdown(&self, url: &str) -> Result<polis_fetch::Fetched> {
            Err(PolisError::remote(url, "unreachable"))
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        follows: AtomicUsize,
        unfollows: AtomicUsize,
    }

    impl FollowTransport for RecordingTransport {
        async fn follow_announced(&self, _target_domain: &str) -> Result<()> {
            self.follows.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn follow_removed(&self, _target_domain: &str) -> Result<()> {
            self.unfollows.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manifest() -> SiteManifest {
        SiteManifest {
            site_title: "Bob's Site".into(),
            author: "Bob".into(),
            email: "bob@example.com".into(),
            public_key: "AAAA".into(),
            base_url: "https://bob.example".into(),
        }
    }

    fn setup() -> (TempDir, FollowStore, ContentStore, SiteKeys) {
        let temp = TempDir::new().unwrap();
        let store = FollowStore::new(SitePaths::new(temp.path()));
        let content = ContentStore::new(temp.path());
        let keys = SiteKeys::generate(content.paths()).unwrap();
        (temp, store, content, keys)
    }

    #[tokio::test]
    async fn test_follow_unfollow_round_trip() {
        let (_temp, store, content, _keys) = setup();
        let peer = StaticPeer {
            manifest: Some(manifest()),
        };
        let transport = RecordingTransport::default();

        store
            .follow("https://bob.example/", &peer, &transport, &content)
            .await
            .unwrap();
        assert!(store.is_followed("https://bob.example").unwrap());
        let list = store.list().unwrap();
        assert_eq!(list[0].site_title.as_deref(), Some("Bob's Site"));
        assert_eq!(transport.follows.load(Ordering::SeqCst), 1);

        store
            .unfollow("https://bob.example", &transport, &content)
            .await
            .unwrap();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(transport.unfollows.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_follow_is_conflict() {
        let (_temp, store, content, _keys) = setup();
        let peer = StaticPeer {
            manifest: Some(manifest()),
        };
        let transport = RecordingTransport::default();
        store
            .follow("https://bob.example", &peer, &transport, &content)
            .await
            .unwrap();
        let err = store
            .follow("https://bob.example", &peer, &transport, &content)
            .await
            .unwrap_err();
        assert!(matches!(err, PolisError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unfollow_unknown_is_not_found() {
        let (_temp, store, content, _keys) = setup();
        let transport = RecordingTransport::default();
        let err = store
            .unfollow("https://bob.example", &transport, &content)
            .await
            .unwrap_err();
        assert!(matches!(err, PolisError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_follow_tolerates_unreachable_manifest() {
        let (_temp, store, content, _keys) = setup();
        let peer = StaticPeer { manifest: None };
        let transport = RecordingTransport::default();
        store
            .follow("https://bob.example", &peer, &transport, &content)
            .await
            .unwrap();
        let list = store.list().unwrap();
        assert!(list[0].site_title.is_none());
        assert!(list[0].needs_backfill());
    }

    #[tokio::test]
    async fn test_backfill_fills_missing_metadata() {
        let (_temp, store, content, _keys) = setup();
        let transport = RecordingTransport::default();
        store
            .follow(
                "https://bob.example",
                &StaticPeer { manifest: None },
                &transport,
                &content,
            )
            .await
            .unwrap();

        let filled = store
            .backfill_metadata(&StaticPeer {
                manifest: Some(manifest()),
            })
            .await
            .unwrap();
        assert_eq!(filled, 1);
        let list = store.list().unwrap();
        assert_eq!(list[0].author_name.as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn test_follow_reblesses_denied_comments() {
        let (_temp, store, content, keys) = setup();
        let front = polis_protocol::CommentFrontmatter {
            id: "c1".into(),
            author: "https://bob.example".into(),
            author_email: "bob@example.com".into(),
            in_reply_to: "https://alice.example/posts/20250101/hello.md".into(),
            root_post: "https://alice.example/posts/20250101/hello.md".into(),
            comment_url: "https://bob.example/comments/20250102/c1.md".into(),
            timestamp: Utc::now(),
            comment_version: "aa".repeat(32),
            in_reply_to_version: None,
        };
        content
            .write_comment(CommentState::Denied, &front, "hello\n", &keys)
            .unwrap();

        let peer = StaticPeer {
            manifest: Some(manifest()),
        };
        let transport = RecordingTransport::default();
        let outcome = store
            .follow("https://bob.example", &peer, &transport, &content)
            .await
            .unwrap();
        assert_eq!(outcome.reblessed, 1);
        assert_eq!(content.locate_comment("c1"), Some(CommentState::Blessed));
        assert!(content
            .read_blessed_comments()
            .unwrap()
            .contains("https://bob.example/comments/20250102/c1.md"));

        // Unfollow demotes it again and drops the index entry.
        let outcome = store
            .unfollow("https://bob.example", &transport, &content)
            .await
            .unwrap();
        assert_eq!(outcome.demoted, 1);
        assert_eq!(content.locate_comment("c1"), Some(CommentState::Denied));
        assert_eq!(content.count_blessed_refs().unwrap(), 0);
    }
}
