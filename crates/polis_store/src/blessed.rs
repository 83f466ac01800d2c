//! metadata/blessed-comments.json: blessed third-party comment references.
//!
//! Owned by the post author; written only when a blessing is granted or
//! revoked. The index carries its own content hash so peers can cache it by
//! version.

use std::fs;

use polis_protocol::{BlessedComments, BlessedPostEntry, BlessingRef, Result};
use polis_security::sha256_hex;

use crate::fsutil;
use crate::ContentStore;

impl ContentStore {
    pub fn read_blessed_comments(&self) -> Result<BlessedComments> {
        let path = self.paths().blessed_comments();
        if !path.exists() {
            return Ok(BlessedComments::default());
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Record a granted blessing under `post_url`. Re-granting the same
    /// comment URL replaces the reference (idempotent on disk).
    pub fn add_blessing(&self, post_url: &str, blessing: BlessingRef) -> Result<()> {
        let _guard = self.blessed_lock.lock().expect("blessed lock poisoned");
        let mut index = self.read_blessed_comments()?;
        match index.comments.iter_mut().find(|e| e.post == post_url) {
            Some(entry) => {
                entry.blessed.retain(|r| r.url != blessing.url);
                entry.blessed.push(blessing);
            }
            None => index.comments.push(BlessedPostEntry {
                post: post_url.to_string(),
                blessed: vec![blessing],
            }),
        }
        self.write_blessed(index)
    }

    /// Remove a blessing by comment URL. Returns whether anything changed.
    pub fn remove_blessing(&self, comment_url: &str) -> Result<bool> {
        let _guard = self.blessed_lock.lock().expect("blessed lock poisoned");
        let mut index = self.read_blessed_comments()?;
        let before: usize = index.comments.iter().map(|e| e.blessed.len()).sum();
        for entry in &mut index.comments {
            entry.blessed.retain(|r| r.url != comment_url);
        }
        index.comments.retain(|e| !e.blessed.is_empty());
        let after: usize = index.comments.iter().map(|e| e.blessed.len()).sum();
        if before == after {
            return Ok(false);
        }
        self.write_blessed(index)?;
        Ok(true)
    }

    pub fn count_blessed_refs(&self) -> Result<usize> {
        Ok(self
            .read_blessed_comments()?
            .comments
            .iter()
            .map(|e| e.blessed.len())
            .sum())
    }

    fn write_blessed(&self, mut index: BlessedComments) -> Result<()> {
        index.version = sha256_hex(serde_json::to_string(&index.comments)?.as_bytes());
        let raw = serde_json::to_string_pretty(&index)?;
        fsutil::write_atomic_str(&self.paths().blessed_comments(), &raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn blessing(url: &str, version: &str) -> BlessingRef {
        BlessingRef {
            url: url.into(),
            version: version.into(),
            blessed_at: Utc::now(),
        }
    }

    const POST: &str = "https://alice.example/posts/20250101/hello.md";
    const COMMENT: &str = "https://bob.example/comments/blessed/c1.md";

    #[test]
    fn test_add_and_read() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path());
        store.add_blessing(POST, blessing(COMMENT, "v1")).unwrap();
        let index = store.read_blessed_comments().unwrap();
        assert!(index.contains(COMMENT));
        assert_eq!(index.comments[0].post, POST);
        assert!(!index.version.is_empty());
    }

    #[test]
    fn test_regrant_replaces_reference() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path());
        store.add_blessing(POST, blessing(COMMENT, "v1")).unwrap();
        store.add_blessing(POST, blessing(COMMENT, "v2")).unwrap();
        let index = store.read_blessed_comments().unwrap();
        assert_eq!(index.comments[0].blessed.len(), 1);
        assert_eq!(index.comments[0].blessed[0].version, "v2");
    }

    #[test]
    fn test_remove_drops_empty_entries() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path());
        store.add_blessing(POST, blessing(COMMENT, "v1")).unwrap();
        assert!(store.remove_blessing(COMMENT).unwrap());
        let index = store.read_blessed_comments().unwrap();
        assert!(index.comments.is_empty());
        assert!(!store.remove_blessing(COMMENT).unwrap());
    }

    #[test]
    fn test_index_version_tracks_content() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path());
        store.add_blessing(POST, blessing(COMMENT, "v1")).unwrap();
        let v1 = store.read_blessed_comments().unwrap().version;
        store
            .add_blessing(POST, blessing("https://carol.example/comments/blessed/c2.md", "v1"))
            .unwrap();
        let v2 = store.read_blessed_comments().unwrap().version;
        assert_ne!(v1, v2);
    }
}
