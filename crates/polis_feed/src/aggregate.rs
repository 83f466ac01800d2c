//! Feed aggregation over the follow set.
//!
//! Conceptually a projection, but driven by direct fetches of each followed
//! site's public index: the discovery stream does not carry post bodies.
//! Per-author failures are collected, never fatal.

use chrono::Utc;

use polis_fetch::{join_url, PeerClient};
use polis_protocol::{AuthorError, FollowedSite, PostFrontmatter, Result};
use polis_store::frontmatter;

use crate::{item_id, CachedItem, FeedCache, FeedItemType};

/// Everything one aggregation pass produced.
#[derive(Debug, Default)]
pub struct AggregateResult {
    pub items: Vec<CachedItem>,
    pub errors: Vec<AuthorError>,
}

/// Fetch every followed author's index and collect items the cache has not
/// seen (keyed by url+version).
pub async fn aggregate<P: PeerClient>(
    following: &[FollowedSite],
    peer: &P,
    cache: &FeedCache,
) -> AggregateResult {
    let mut result = AggregateResult::default();

    for site in following {
        match aggregate_author(site, peer, cache, &mut result.items).await {
            Ok(()) => {}
            Err(err) => {
                tracing::warn!(url = %site.url, error = %err, "feed aggregation failed for author");
                result.errors.push(AuthorError {
                    url: site.url.clone(),
                    message: err.to_string(),
                });
            }
        }
    }

    result
}

async fn aggregate_author<P: PeerClient>(
    site: &FollowedSite,
    peer: &P,
    cache: &FeedCache,
    items: &mut Vec<CachedItem>,
) -> Result<()> {
    // Manifest first: cache-friendly for peers and confirms the site is
    // still a Polis site before the heavier index fetch.
    let manifest = peer.fetch_manifest(&site.url).await?;
    let domain = manifest.domain()?;

    let index = peer.fetch_public_index(&site.url).await?;
    for entry in index {
        let url = join_url(&site.url, &entry.path);
        let id = item_id(&domain, &url, &entry.version);
        if cache.contains(&id) || items.iter().any(|item| item.id == id) {
            continue;
        }

        let title = if entry.title.trim().is_empty() {
            fetch_title(peer, &url).await
        } else {
            entry.title.clone()
        };

        items.push(CachedItem {
            id,
            item_type: item_type_for(&entry.path),
            url,
            title,
            author_domain: domain.clone(),
            published: entry.published,
            fetched_at: Utc::now(),
            read_at: None,
        });
    }
    Ok(())
}

/// Derive a title for an index line that carries none: fetch the item and
/// read its frontmatter, falling back to the first heading.
async fn fetch_title<P: PeerClient>(peer: &P, url: &str) -> String {
    match peer.fetch_markdown(url).await {
        Ok(fetched) => title_from_document(&fetched.body),
        Err(err) => {
            tracing::debug!(%url, error = %err, "could not fetch item for title");
            "Untitled".to_string()
        }
    }
}

fn title_from_document(content: &str) -> String {
    if let Ok((front, _)) = frontmatter::parse::<PostFrontmatter>(content) {
        return front.title;
    }
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim();
            if !heading.is_empty() {
                return heading.to_string();
            }
            continue;
        }
        return trimmed.to_string();
    }
    "Untitled".to_string()
}

fn item_type_for(path: &str) -> FeedItemType {
    if path.starts_with("comments/") {
        FeedItemType::Comment
    } else {
        FeedItemType::Post
    }
}
