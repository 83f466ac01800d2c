//! Drafts under .polis/{posts,comments}/drafts/.
//!
//! Drafts are plain Markdown, unsigned and unindexed until published.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

use polis_protocol::{PolisError, Result};

use crate::fsutil;
use crate::ContentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    Post,
    Comment,
}

#[derive(Debug, Clone)]
pub struct Draft {
    pub name: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

impl ContentStore {
    fn drafts_dir(&self, kind: DraftKind) -> PathBuf {
        match kind {
            DraftKind::Post => self.paths().post_drafts_dir(),
            DraftKind::Comment => self.paths().comment_drafts_dir(),
        }
    }

    fn draft_path(&self, kind: DraftKind, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
            || name.starts_with('.')
        {
            return Err(PolisError::validation(format!("invalid draft name: {name}")));
        }
        Ok(self.drafts_dir(kind).join(format!("{name}.md")))
    }

    pub fn save_draft(&self, kind: DraftKind, name: &str, body: &str) -> Result<()> {
        let path = self.draft_path(kind, name)?;
        fsutil::write_atomic_str(&path, body)?;
        Ok(())
    }

    pub fn read_draft(&self, kind: DraftKind, name: &str) -> Result<String> {
        let path = self.draft_path(kind, name)?;
        if !path.exists() {
            return Err(PolisError::not_found(format!("draft {name}")));
        }
        Ok(fs::read_to_string(&path)?)
    }

    pub fn list_drafts(&self, kind: DraftKind) -> Result<Vec<Draft>> {
        let dir = self.drafts_dir(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut drafts = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(name) = file_name.strip_suffix(".md") else {
                continue;
            };
            let meta = entry.metadata()?;
            drafts.push(Draft {
                name: name.to_string(),
                modified: meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now()),
                size: meta.len(),
            });
        }
        drafts.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(drafts)
    }

    pub fn delete_draft(&self, kind: DraftKind, name: &str) -> Result<()> {
        let path = self.draft_path(kind, name)?;
        if !path.exists() {
            return Err(PolisError::not_found(format!("draft {name}")));
        }
        fs::remove_file(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_draft_lifecycle() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path());
        store.save_draft(DraftKind::Post, "wip", "# Work\n").unwrap();
        assert_eq!(store.read_draft(DraftKind::Post, "wip").unwrap(), "# Work\n");
        assert_eq!(store.list_drafts(DraftKind::Post).unwrap().len(), 1);
        store.delete_draft(DraftKind::Post, "wip").unwrap();
        assert!(store.list_drafts(DraftKind::Post).unwrap().is_empty());
    }

    #[test]
    fn test_draft_name_validation() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path());
        assert!(store.save_draft(DraftKind::Post, "../evil", "x").is_err());
        assert!(store.save_draft(DraftKind::Post, "a/b", "x").is_err());
        assert!(store.save_draft(DraftKind::Post, ".hidden", "x").is_err());
        assert!(store.save_draft(DraftKind::Post, "", "x").is_err());
    }

    #[test]
    fn test_post_and_comment_drafts_are_separate() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path());
        store.save_draft(DraftKind::Post, "one", "p").unwrap();
        store.save_draft(DraftKind::Comment, "one", "c").unwrap();
        assert_eq!(store.read_draft(DraftKind::Post, "one").unwrap(), "p");
        assert_eq!(store.read_draft(DraftKind::Comment, "one").unwrap(), "c");
    }
}
