//! Post publishing and reads.

use chrono::Utc;
use std::fs;

use polis_protocol::defaults::MAX_TITLE_LEN;
use polis_protocol::{PolisError, PostFrontmatter, PublicIndexEntry, PublishResult, Result};
use polis_security::{content_version, sign_content, verify_content, SiteKeys};

use crate::frontmatter;
use crate::fsutil;
use crate::ContentStore;

/// A post read back from disk.
#[derive(Debug, Clone)]
pub struct Post {
    pub rel_path: String,
    pub frontmatter: PostFrontmatter,
    pub body: String,
}

impl ContentStore {
    /// Publish raw Markdown (no frontmatter) as a new signed post.
    pub fn publish_post(
        &self,
        body: &str,
        filename: Option<&str>,
        keys: &SiteKeys,
    ) -> Result<PublishResult> {
        if body.trim().is_empty() {
            return Err(PolisError::validation("post body is empty"));
        }

        let title = derive_title(body);
        let requested_slug = match filename {
            Some(name) => slugify(name.trim_end_matches(".md")),
            None => slugify(&title),
        };

        let published = Utc::now();
        let date_dir = published.format("%Y%m%d").to_string();
        let slug = self.resolve_slug_collision(&date_dir, &requested_slug);
        let version = content_version(body);

        let front = PostFrontmatter {
            title: title.clone(),
            published,
            updated: None,
            version: version.clone(),
        };
        let file = frontmatter::render(&front, body)?;
        let signature = sign_content(file.as_bytes(), keys.signing_key());

        let path = self.paths().post_file(&date_dir, &slug);
        let rel_path = format!("posts/{date_dir}/{slug}.md");
        // Signature first: a post file must never exist without one.
        fsutil::write_atomic_str(&path.with_extension("md.sig"), &signature)?;
        fsutil::write_atomic_str(&path, &file)?;

        self.append_index_entry(&PublicIndexEntry {
            path: rel_path.clone(),
            title: title.clone(),
            published,
            updated: None,
            version: version.clone(),
        })?;

        tracing::info!(path = %rel_path, %title, "published post");

        Ok(PublishResult {
            success: true,
            path: rel_path,
            title,
            version,
            published,
            updated: None,
            hook: None,
        })
    }

    /// Re-sign and rewrite an existing post with a new body, preserving its
    /// original publication time.
    pub fn republish_post(
        &self,
        rel_path: &str,
        body: &str,
        keys: &SiteKeys,
    ) -> Result<PublishResult> {
        if body.trim().is_empty() {
            return Err(PolisError::validation("post body is empty"));
        }

        let existing = self.read_post(rel_path)?;
        let updated = Utc::now();
        let version = content_version(body);

        let front = PostFrontmatter {
            title: existing.frontmatter.title.clone(),
            published: existing.frontmatter.published,
            updated: Some(updated),
            version: version.clone(),
        };
        let file = frontmatter::render(&front, body)?;
        let signature = sign_content(file.as_bytes(), keys.signing_key());

        let path = self.paths().resolve(rel_path)?;
        fsutil::write_atomic_str(&path.with_extension("md.sig"), &signature)?;
        fsutil::write_atomic_str(&path, &file)?;

        self.replace_index_entry(&PublicIndexEntry {
            path: rel_path.to_string(),
            title: front.title.clone(),
            published: front.published,
            updated: front.updated,
            version: version.clone(),
        })?;

        tracing::info!(path = %rel_path, "republished post");

        Ok(PublishResult {
            success: true,
            path: rel_path.to_string(),
            title: front.title,
            version,
            published: front.published,
            updated: front.updated,
            hook: None,
        })
    }

    /// Read a post, returning typed frontmatter and the verbatim body.
    pub fn read_post(&self, rel_path: &str) -> Result<Post> {
        let path = self.paths().resolve(rel_path)?;
        if !path.exists() {
            return Err(PolisError::not_found(format!("post {rel_path}")));
        }
        let content = fs::read_to_string(&path)?;
        let (front, body) = frontmatter::parse::<PostFrontmatter>(&content)?;
        Ok(Post {
            rel_path: rel_path.to_string(),
            frontmatter: front,
            body: body.to_string(),
        })
    }

    /// Verify the detached signature of any signed artifact against a public
    /// key (the site's own, or a peer's).
    pub fn verify_signature(
        &self,
        rel_path: &str,
        key: &ed25519_dalek::VerifyingKey,
    ) -> Result<()> {
        let path = self.paths().resolve(rel_path)?;
        let sig_path = path.with_extension("md.sig");
        if !sig_path.exists() {
            return Err(PolisError::CryptoVerify(format!(
                "missing signature for {rel_path}"
            )));
        }
        let content = fs::read(&path)?;
        let signature = fs::read_to_string(&sig_path)?;
        verify_content(&content, &signature, key)
    }

    fn resolve_slug_collision(&self, date_dir: &str, slug: &str) -> String {
        if !self.paths().post_file(date_dir, slug).exists() {
            return slug.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{slug}-{n}");
            if !self.paths().post_file(date_dir, &candidate).exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

/// First `#` heading, else first non-empty line, bounded at 80 characters.
fn derive_title(body: &str) -> String {
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let title = if let Some(heading) = trimmed.strip_prefix('#') {
            heading.trim_start_matches('#').trim()
        } else {
            trimmed
        };
        if title.is_empty() {
            continue;
        }
        return title.chars().take(MAX_TITLE_LEN).collect();
    }
    "Untitled".to_string()
}

/// Sanitize to `[a-zA-Z0-9_-]`, collapsing runs of other characters.
fn slugify(input: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}
