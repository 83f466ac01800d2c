//! Shared fixtures for integration tests.
//!
//! Real site directories in tempdirs, plus in-memory peers at the network
//! seams the core treats as external.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use polis_fetch::{Fetched, PeerClient};
use polis_protocol::{PolisError, PublicIndexEntry, Result, SiteManifest};
use polis_security::SiteKeys;
use polis_store::{ContentStore, InitOptions};

pub mod blessings;

pub use blessings::ScriptedDiscovery;

/// A fully initialized site in a tempdir.
pub struct TestSite {
    pub temp: TempDir,
    pub content: ContentStore,
    pub keys: SiteKeys,
    pub manifest: SiteManifest,
}

impl TestSite {
    /// Initialize a site for `name` at https://<name>.
    pub fn new(name: &str) -> Self {
        let temp = TempDir::new().expect("tempdir");
        let content = ContentStore::new(temp.path());
        let keys = SiteKeys::generate(content.paths()).expect("keys");
        let manifest = content
            .init_site(
                &InitOptions {
                    site_title: format!("{name} site"),
                    author: name.to_string(),
                    email: format!("{name}@example.com"),
                    base_url: format!("https://{name}"),
                    force: false,
                },
                &keys,
            )
            .expect("init site");
        Self {
            temp,
            content,
            keys,
            manifest,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.manifest.base_url
    }

    pub fn domain(&self) -> String {
        self.manifest.domain().expect("domain")
    }
}

/// One peer site as the fetcher sees it.
#[derive(Debug, Clone, Default)]
pub struct PeerSite {
    pub manifest: Option<SiteManifest>,
    pub index: Vec<PublicIndexEntry>,
    pub documents: HashMap<String, String>,
}

/// In-memory [`PeerClient`]: a map of base URLs to served content.
#[derive(Debug, Clone, Default)]
pub struct MemoryPeers {
    sites: Arc<Mutex<HashMap<String, PeerSite>>>,
}

impl MemoryPeers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, base_url: &str, site: PeerSite) {
        self.sites
            .lock()
            .expect("peer lock poisoned")
            .insert(base_url.trim_end_matches('/').to_string(), site);
    }

    /// Publish a [`TestSite`]'s current manifest and index at its base URL.
    pub fn serve_site(&self, site: &TestSite) {
        let index = site.content.read_index().expect("index");
        let mut documents = HashMap::new();
        for entry in &index {
            let path = site.content.paths().resolve(&entry.path).expect("path");
            let body = std::fs::read_to_string(path).expect("post body");
            documents.insert(format!("{}/{}", site.base_url(), entry.path), body);
        }
        self.serve(
            site.base_url(),
            PeerSite {
                manifest: Some(site.manifest.clone()),
                index,
                documents,
            },
        );
    }

    fn site(&self, base_url: &str) -> Result<PeerSite> {
        self.sites
            .lock()
            .expect("peer lock poisoned")
            .get(base_url.trim_end_matches('/'))
            .cloned()
            .ok_or_else(|| PolisError::remote(base_url, "unknown peer"))
    }
}

impl PeerClient for MemoryPeers {
    async fn fetch_manifest(&self, base_url: &str) -> Result<SiteManifest> {
        self.site(base_url)?
            .manifest
            .ok_or_else(|| PolisError::remote(base_url, "no manifest"))
    }

    async fn fetch_public_index(&self, base_url: &str) -> Result<Vec<PublicIndexEntry>> {
        Ok(self.site(base_url)?.index)
    }

    async fn fetch_markdown(&self, url: &str) -> Result<Fetched> {
        let base = url
            .rsplitn(2, "/posts/")
            .nth(1)
            .or_else(|| url.rsplitn(2, "/comments/").nth(1))
            .unwrap_or(url);
        let site = self.site(base)?;
        match site.documents.get(url) {
            Some(body) => Ok(Fetched {
                body: body.clone(),
                final_url: url.to_string(),
            }),
            None => Err(PolisError::remote(url, "HTTP 404")),
        }
    }
}
