//! Content store for a Polis site directory.
//!
//! Reads and writes posts, comments, and drafts, and maintains the
//! public.jsonl and blessed-comments.json indices. The process owns the
//! directory exclusively; within the process, index writes are serialized
//! through per-file locks while readers parse consistent snapshots lock-free.

use std::path::PathBuf;
use std::sync::Mutex;

use polis_protocol::SitePaths;

pub mod blessed;
pub mod comments;
pub mod drafts;
pub mod frontmatter;
pub mod fsutil;
pub mod index;
pub mod layout;
pub mod posts;
pub mod validate;

pub use comments::Comment;
pub use drafts::{Draft, DraftKind};
pub use layout::InitOptions;
pub use posts::Post;

/// File-backed content store rooted at one site directory.
#[derive(Debug)]
pub struct ContentStore {
    paths: SitePaths,
    index_lock: Mutex<()>,
    blessed_lock: Mutex<()>,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: SitePaths::new(root.into()),
            index_lock: Mutex::new(()),
            blessed_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }
}
