//! Site directory validation.
//!
//! Classifies a site as valid, incomplete, invalid, or not found. Every
//! finding carries a code, the offending path, and a suggestion the UI can
//! show verbatim.

use ed25519_dalek::VerifyingKey;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use polis_protocol::{
    CommentState, PostFrontmatter, Result, SiteCheck, SiteManifest, SiteReport, SiteStatus,
};
use polis_security::{content_version, verify_content, SiteKeys};

use crate::frontmatter;
use crate::ContentStore;

impl ContentStore {
    pub fn validate_site(&self) -> Result<SiteReport> {
        let paths = self.paths();
        if !paths.root().exists() {
            return Ok(SiteReport {
                status: SiteStatus::NotFound,
                checks: vec![check(
                    "site_missing",
                    paths.root(),
                    "Create the directory or run init",
                )],
            });
        }

        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        if !paths.private_key().exists() || !paths.public_key().exists() {
            missing.push(check(
                "keys_missing",
                &paths.keys_dir(),
                "Run init to generate an Ed25519 keypair",
            ));
        } else if let Err(err) = SiteKeys::load(paths) {
            invalid.push(check(
                "keys_invalid",
                &paths.keys_dir(),
                &format!("Keypair unreadable ({err}); restore from backup or re-init"),
            ));
        }

        if !paths.well_known().exists() {
            missing.push(check(
                "manifest_missing",
                &paths.well_known(),
                "Run init to write .well-known/polis",
            ));
        } else {
            match fs::read_to_string(paths.well_known()) {
                Ok(raw) => {
                    if serde_json::from_str::<SiteManifest>(&raw).is_err() {
                        invalid.push(check(
                            "manifest_invalid",
                            &paths.well_known(),
                            "Manifest is not valid JSON; re-init or fix by hand",
                        ));
                    }
                }
                Err(_) => invalid.push(check(
                    "manifest_invalid",
                    &paths.well_known(),
                    "Manifest unreadable; check permissions",
                )),
            }
        }

        for (name, dir) in required_dirs(self) {
            if !dir.exists() {
                missing.push(check(
                    "dir_missing",
                    &dir,
                    &format!("Create {name} (init recreates all required directories)"),
                ));
            }
        }

        let status = if !invalid.is_empty() {
            SiteStatus::Invalid
        } else if !missing.is_empty() {
            SiteStatus::Incomplete
        } else {
            SiteStatus::Valid
        };
        let mut checks = invalid;
        checks.extend(missing);
        Ok(SiteReport { status, checks })
    }

    /// Deep content check: every post carries a signature that verifies and
    /// a version matching its body hash.
    pub fn verify_content_integrity(&self, key: &VerifyingKey) -> Result<Vec<SiteCheck>> {
        let mut findings = Vec::new();
        let posts = self.paths().posts_dir();
        if !posts.exists() {
            return Ok(findings);
        }
        for entry in WalkDir::new(&posts).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some("md")
            {
                continue;
            }

            let sig_path = path.with_extension("md.sig");
            if !sig_path.exists() {
                findings.push(check(
                    "signature_missing",
                    path,
                    "Republish the post to regenerate its signature",
                ));
                continue;
            }
            let content = fs::read_to_string(path)?;
            let signature = fs::read_to_string(&sig_path)?;
            if verify_content(content.as_bytes(), &signature, key).is_err() {
                findings.push(check(
                    "signature_invalid",
                    path,
                    "Signature does not verify; republish the post",
                ));
            }
            match frontmatter::parse::<PostFrontmatter>(&content) {
                Ok((front, body)) => {
                    if front.version != content_version(body) {
                        findings.push(check(
                            "version_mismatch",
                            path,
                            "Frontmatter version does not match the body hash",
                        ));
                    }
                }
                Err(_) => findings.push(check(
                    "frontmatter_invalid",
                    path,
                    "Frontmatter does not parse; republish the post",
                )),
            }
        }
        Ok(findings)
    }
}

fn required_dirs(store: &ContentStore) -> Vec<(&'static str, std::path::PathBuf)> {
    let paths = store.paths();
    let mut dirs = vec![
        ("posts/", paths.posts_dir()),
        ("metadata/", paths.metadata_dir()),
    ];
    for state in CommentState::ALL {
        let name = match state {
            CommentState::Pending => "comments/pending/",
            CommentState::Blessed => "comments/blessed/",
            CommentState::Denied => "comments/denied/",
        };
        dirs.push((name, paths.comments_dir(state)));
    }
    dirs
}

fn check(code: &str, path: &Path, suggestion: &str) -> SiteCheck {
    SiteCheck {
        code: code.to_string(),
        path: path.display().to_string(),
        suggestion: suggestion.to_string(),
    }
}
