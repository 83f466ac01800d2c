//! Polite HTTPS fetcher for peer sites.
//!
//! Short timeout, fixed user agent, and at most two manually-followed
//! redirects. Peers may serve raw Markdown or server-rendered HTML at either
//! extension; [`RemoteFetcher::fetch_markdown`] sniffs the body and retries
//! the alternate extension once.

use std::time::Duration;

use polis_protocol::defaults::{FETCH_MAX_REDIRECTS, FETCH_TIMEOUT_SECS, USER_AGENT};
use polis_protocol::{PolisError, PublicIndexEntry, Result, SiteManifest};

/// A fetched document plus the URL it finally resolved to.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub final_url: String,
}

/// Capability the feed aggregator and follow store need from the network.
/// Tests drive them with an in-memory implementation instead.
pub trait PeerClient {
    fn fetch_manifest(
        &self,
        base_url: &str,
    ) -> impl std::future::Future<Output = Result<SiteManifest>> + Send;

    fn fetch_public_index(
        &self,
        base_url: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PublicIndexEntry>>> + Send;

    fn fetch_markdown(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Fetched>> + Send;
}

/// reqwest-backed fetcher with redirects disabled; hops are followed by hand
/// so the cap is exact.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
}

impl RemoteFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PolisError::remote("fetcher", format!("client build failed: {e}")))?;
        Ok(Self { client })
    }

    /// GET a URL, following at most [`FETCH_MAX_REDIRECTS`] redirects.
    pub async fn fetch(&self, url: &str) -> Result<Fetched> {
        let mut current = url.to_string();
        for _hop in 0..=FETCH_MAX_REDIRECTS {
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|e| PolisError::remote(&current, e.to_string()))?;

            if response.status().is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        PolisError::remote(&current, "redirect without Location header")
                    })?;
                current = resolve_redirect(&current, location)?;
                continue;
            }

            if !response.status().is_success() {
                return Err(PolisError::remote(
                    &current,
                    format!("HTTP {}", response.status()),
                ));
            }

            let body = response
                .text()
                .await
                .map_err(|e| PolisError::remote(&current, e.to_string()))?;
            return Ok(Fetched {
                body,
                final_url: current,
            });
        }
        Err(PolisError::remote(url, "too many redirects"))
    }
}

impl PeerClient for RemoteFetcher {
    async fn fetch_manifest(&self, base_url: &str) -> Result<SiteManifest> {
        let url = join_url(base_url, ".well-known/polis");
        let fetched = self.fetch(&url).await?;
        serde_json::from_str(&fetched.body)
            .map_err(|e| PolisError::remote(&url, format!("invalid manifest: {e}")))
    }

    async fn fetch_public_index(&self, base_url: &str) -> Result<Vec<PublicIndexEntry>> {
        let url = join_url(base_url, "metadata/public.jsonl");
        let fetched = self.fetch(&url).await?;
        let mut entries = Vec::new();
        for line in fetched.body.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<PublicIndexEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(%url, error = %e, "skipping malformed index line"),
            }
        }
        Ok(entries)
    }

    /// Fetch a URL expecting raw Markdown. If the body sniffs as HTML, retry
    /// once with the alternate extension (.md <-> .html).
    async fn fetch_markdown(&self, url: &str) -> Result<Fetched> {
        let fetched = self.fetch(url).await?;
        if !looks_like_html(&fetched.body) {
            return Ok(fetched);
        }
        let Some(alternate) = alternate_extension(url) else {
            return Err(PolisError::remote(url, "expected Markdown, got HTML"));
        };
        tracing::debug!(%url, %alternate, "HTML where Markdown expected, trying alternate");
        let retried = self.fetch(&alternate).await?;
        if looks_like_html(&retried.body) {
            return Err(PolisError::remote(url, "expected Markdown, got HTML"));
        }
        Ok(retried)
    }
}

/// Prefix inspection: server-rendered pages start with a doctype or html tag.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let lower: String = head.chars().take(16).collect::<String>().to_ascii_lowercase();
    lower.starts_with("<!doctype") || lower.starts_with("<html")
}

/// Swap .md <-> .html on the final path segment.
pub fn alternate_extension(url: &str) -> Option<String> {
    if let Some(stem) = url.strip_suffix(".md") {
        Some(format!("{stem}.html"))
    } else {
        url.strip_suffix(".html").map(|stem| format!("{stem}.md"))
    }
}

fn resolve_redirect(base: &str, location: &str) -> Result<String> {
    let base_url = url::Url::parse(base)
        .map_err(|e| PolisError::remote(base, format!("invalid URL: {e}")))?;
    let next = base_url
        .join(location)
        .map_err(|e| PolisError::remote(base, format!("invalid redirect target: {e}")))?;
    Ok(next.to_string())
}

pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}
