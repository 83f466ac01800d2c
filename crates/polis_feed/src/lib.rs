//! Feed cache: followed authors' items with read state.
//!
//! Merge-on-refresh semantics: new items are inserted, existing items keep
//! their `read_at`, ordering is published-descending, and the cache is capped
//! with oldest-read-first eviction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Mutex;

use polis_protocol::defaults::{DEFAULT_FEED_CAP, DEFAULT_FEED_STALE_SECS};
use polis_protocol::{PolisError, Result, SitePaths};
use polis_security::short_hash;
use polis_store::fsutil;

pub mod aggregate;

pub use aggregate::{aggregate, AggregateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedItemType {
    Post,
    Comment,
}

/// One cached feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedItem {
    /// Stable hash of (author_domain, url, version).
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: FeedItemType,
    pub url: String,
    pub title: String,
    pub author_domain: String,
    pub published: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

/// .polis/feed/cache.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedCache {
    #[serde(default)]
    pub refreshed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<CachedItem>,
}

impl FeedCache {
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }
}

/// Identity of a feed item across refreshes and republishes.
pub fn item_id(author_domain: &str, url: &str, version: &str) -> String {
    short_hash(&[author_domain, url, version])
}

/// Feed read-state counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeedCounts {
    pub total: usize,
    pub unread: usize,
    pub stale: bool,
}

#[derive(Debug)]
pub struct FeedStore {
    paths: SitePaths,
    lock: Mutex<()>,
    cap: usize,
    stale_after: Duration,
}

impl FeedStore {
    pub fn new(paths: SitePaths) -> Self {
        Self {
            paths,
            lock: Mutex::new(()),
            cap: DEFAULT_FEED_CAP,
            stale_after: Duration::seconds(DEFAULT_FEED_STALE_SECS),
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap.max(1);
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn load(&self) -> Result<FeedCache> {
        let path = self.paths.feed_cache();
        if !path.exists() {
            return Ok(FeedCache::default());
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Insert new items, keeping existing read state. Returns how many items
    /// were actually new.
    pub fn merge(&self, new_items: Vec<CachedItem>) -> Result<usize> {
        let _guard = self.lock.lock().expect("feed lock poisoned");
        let mut cache = self.load()?;
        let mut added = 0;
        for item in new_items {
            if !cache.contains(&item.id) {
                cache.items.push(item);
                added += 1;
            }
        }
        cache.items.sort_by(|a, b| b.published.cmp(&a.published));
        evict_over_cap(&mut cache.items, self.cap);
        cache.refreshed_at = Some(Utc::now());
        self.write(&cache)?;
        Ok(added)
    }

    pub fn mark_read(&self, id: &str) -> Result<()> {
        self.set_read_at(id, Some(Utc::now()))
    }

    pub fn mark_unread(&self, id: &str) -> Result<()> {
        self.set_read_at(id, None)
    }

    pub fn mark_all_read(&self) -> Result<usize> {
        let _guard = self.lock.lock().expect("feed lock poisoned");
        let mut cache = self.load()?;
        let now = Utc::now();
        let mut changed = 0;
        for item in &mut cache.items {
            if item.read_at.is_none() {
                item.read_at = Some(now);
                changed += 1;
            }
        }
        if changed > 0 {
            self.write(&cache)?;
        }
        Ok(changed)
    }

    /// Flip the item and everything at-or-after it in published order back to
    /// unread.
    pub fn mark_unread_from(&self, id: &str) -> Result<usize> {
        let _guard = self.lock.lock().expect("feed lock poisoned");
        let mut cache = self.load()?;
        cache.items.sort_by(|a, b| b.published.cmp(&a.published));
        let Some(index) = cache.items.iter().position(|item| item.id == id) else {
            return Err(PolisError::not_found(format!("feed item {id}")));
        };
        let mut changed = 0;
        for item in &mut cache.items[index..] {
            if item.read_at.is_some() {
                item.read_at = None;
                changed += 1;
            }
        }
        if changed > 0 {
            self.write(&cache)?;
        }
        Ok(changed)
    }

    pub fn counts(&self) -> FeedCounts {
        // Count reads never fail; fall back to an empty snapshot.
        let cache = self.load().unwrap_or_default();
        FeedCounts {
            total: cache.items.len(),
            unread: cache.items.iter().filter(|i| i.read_at.is_none()).count(),
            stale: self.is_stale(&cache),
        }
    }

    pub fn is_stale(&self, cache: &FeedCache) -> bool {
        match cache.refreshed_at {
            Some(refreshed_at) => Utc::now() - refreshed_at > self.stale_after,
            None => true,
        }
    }

    fn set_read_at(&self, id: &str, read_at: Option<DateTime<Utc>>) -> Result<()> {
        let _guard = self.lock.lock().expect("feed lock poisoned");
        let mut cache = self.load()?;
        let item = cache
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| PolisError::not_found(format!("feed item {id}")))?;
        item.read_at = read_at;
        self.write(&cache)
    }

    fn write(&self, cache: &FeedCache) -> Result<()> {
        let raw = serde_json::to_string_pretty(cache)?;
        fsutil::write_atomic_str(&self.paths.feed_cache(), &raw)?;
        Ok(())
    }
}

/// Evict down to `cap`: oldest read items go first; when everything is
/// unread, the oldest item overall goes. Items must be sorted newest-first.
fn evict_over_cap(items: &mut Vec<CachedItem>, cap: usize) {
    while items.len() > cap {
        let victim = items
            .iter()
            .rposition(|item| item.read_at.is_some())
            .unwrap_or(items.len() - 1);
        items.remove(victim);
    }
}
