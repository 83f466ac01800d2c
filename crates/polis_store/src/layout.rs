//! Site directory initialization.

use std::fs;

use polis_protocol::{CommentState, PolisError, Result, SiteManifest};
use polis_security::SiteKeys;

use crate::fsutil;
use crate::ContentStore;

/// Options for initializing a fresh site directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub site_title: String,
    pub author: String,
    pub email: String,
    pub base_url: String,
    /// Overwrite an existing manifest instead of refusing.
    pub force: bool,
}

impl ContentStore {
    /// Create the required directory layout, manifest, and empty indices.
    ///
    /// Refuses to relink a directory that already carries a manifest unless
    /// `force` is set.
    pub fn init_site(&self, opts: &InitOptions, keys: &SiteKeys) -> Result<SiteManifest> {
        let paths = self.paths();
        if paths.well_known().exists() && !opts.force {
            return Err(PolisError::conflict(format!(
                "{} already contains a Polis site",
                paths.root().display()
            )));
        }

        fs::create_dir_all(paths.posts_dir())?;
        for state in CommentState::ALL {
            fs::create_dir_all(paths.comments_dir(state))?;
        }
        fs::create_dir_all(paths.metadata_dir())?;
        fs::create_dir_all(paths.post_drafts_dir())?;
        fs::create_dir_all(paths.comment_drafts_dir())?;
        fs::create_dir_all(paths.hooks_dir())?;

        let manifest = SiteManifest {
            site_title: opts.site_title.clone(),
            author: opts.author.clone(),
            email: opts.email.clone(),
            public_key: keys.public_key_b64(),
            base_url: opts.base_url.trim_end_matches('/').to_string(),
        };
        self.write_manifest(&manifest)?;

        if !paths.public_index().exists() {
            fsutil::write_atomic_str(&paths.public_index(), "")?;
        }
        if !paths.blessed_comments().exists() {
            let empty = polis_protocol::BlessedComments::default();
            fsutil::write_atomic_str(
                &paths.blessed_comments(),
                &serde_json::to_string_pretty(&empty)?,
            )?;
        }

        tracing::info!(root = %paths.root().display(), "initialized site");
        Ok(manifest)
    }

    pub fn read_manifest(&self) -> Result<SiteManifest> {
        let path = self.paths().well_known();
        if !path.exists() {
            return Err(PolisError::not_configured(format!(
                "missing manifest at {}",
                path.display()
            )));
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_manifest(&self, manifest: &SiteManifest) -> Result<()> {
        let raw = serde_json::to_string_pretty(manifest)?;
        fsutil::write_atomic_str(&self.paths().well_known(), &raw)?;
        Ok(())
    }
}
