//! Typed paths into a site directory.
//!
//! All caller-supplied relative paths go through [`SitePaths::resolve`], which
//! enforces the allowed-prefix discipline once, at construction, instead of at
//! every use site.

use std::path::{Path, PathBuf};

use crate::error::{PolisError, Result};
use crate::types::CommentState;

/// Relative prefixes a caller-supplied path may start with.
const ALLOWED_PREFIXES: &[&str] = &["posts/", "comments/", "metadata/", ".polis/", ".well-known/"];

/// Resolve the Polis home directory.
///
/// Priority:
/// 1) POLIS_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.polis_server
pub fn polis_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("POLIS_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".polis_server");
    }
    PathBuf::from(".").join(".polis_server")
}

/// Path helper rooted at a single site directory.
#[derive(Debug, Clone)]
pub struct SitePaths {
    root: PathBuf,
}

impl SitePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn well_known(&self) -> PathBuf {
        self.root.join(".well-known").join("polis")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    pub fn private_key(&self) -> PathBuf {
        self.keys_dir().join("private.key")
    }

    pub fn public_key(&self) -> PathBuf {
        self.keys_dir().join("public.key")
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.root.join("posts")
    }

    /// posts/YYYYMMDD/<slug>.md
    pub fn post_file(&self, date_dir: &str, slug: &str) -> PathBuf {
        self.posts_dir().join(date_dir).join(format!("{slug}.md"))
    }

    pub fn comments_dir(&self, state: CommentState) -> PathBuf {
        self.root.join("comments").join(state.as_str())
    }

    pub fn comment_file(&self, state: CommentState, id: &str) -> PathBuf {
        self.comments_dir(state).join(format!("{id}.md"))
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    pub fn public_index(&self) -> PathBuf {
        self.metadata_dir().join("public.jsonl")
    }

    pub fn blessed_comments(&self) -> PathBuf {
        self.metadata_dir().join("blessed-comments.json")
    }

    pub fn polis_dir(&self) -> PathBuf {
        self.root.join(".polis")
    }

    pub fn post_drafts_dir(&self) -> PathBuf {
        self.polis_dir().join("posts").join("drafts")
    }

    pub fn comment_drafts_dir(&self) -> PathBuf {
        self.polis_dir().join("comments").join("drafts")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.polis_dir().join("hooks")
    }

    pub fn hook_script(&self, event: &str) -> PathBuf {
        self.hooks_dir().join(format!("{event}.sh"))
    }

    pub fn feed_cache(&self) -> PathBuf {
        self.polis_dir().join("feed").join("cache.json")
    }

    /// .polis/stream/<domain>/<handler>/state.json, one atomic
    /// {cursor, state} blob per handler.
    pub fn stream_state(&self, domain: &str, handler: &str) -> PathBuf {
        self.polis_dir()
            .join("stream")
            .join(domain)
            .join(handler)
            .join("state.json")
    }

    pub fn notifications_file(&self) -> PathBuf {
        self.polis_dir().join("notifications").join("notifications.json")
    }

    pub fn following_file(&self) -> PathBuf {
        self.polis_dir().join("following.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.polis_dir().join("config.json")
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// Resolve a caller-supplied site-relative path.
    ///
    /// Rejects absolute paths, `..` components, null bytes, and anything
    /// outside the allowed prefixes.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        if rel.is_empty() {
            return Err(PolisError::validation("empty path"));
        }
        if rel.contains('\0') {
            return Err(PolisError::validation("path contains a null byte"));
        }
        let normalized = rel.replace('\\', "/");
        if normalized.starts_with('/') {
            return Err(PolisError::validation(format!(
                "absolute path not allowed: {rel}"
            )));
        }
        if normalized.split('/').any(|part| part == "..") {
            return Err(PolisError::validation(format!(
                "path traversal not allowed: {rel}"
            )));
        }
        if !ALLOWED_PREFIXES
            .iter()
            .any(|prefix| normalized.starts_with(prefix))
        {
            return Err(PolisError::validation(format!(
                "path outside allowed prefixes: {rel}"
            )));
        }
        Ok(self.root.join(normalized))
    }

    /// Express an absolute path under the root as a site-relative string.
    pub fn relativize(&self, abs: &Path) -> Result<String> {
        let rel = abs.strip_prefix(&self.root).map_err(|_| {
            PolisError::validation(format!("path outside site root: {}", abs.display()))
        })?;
        Ok(rel.to_string_lossy().replace('\\', "/"))
    }
}
