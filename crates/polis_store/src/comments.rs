//! Comment files and their lifecycle directories.
//!
//! A comment lives in exactly one of comments/{pending,blessed,denied} at any
//! moment. Transitions are directory moves; files are never rewritten.

use std::fs;

use polis_protocol::{CommentFrontmatter, CommentState, PolisError, Result};
use polis_security::{sign_content, SiteKeys};

use crate::frontmatter;
use crate::fsutil;
use crate::ContentStore;

/// A comment read back from disk.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub state: CommentState,
    pub rel_path: String,
    pub frontmatter: CommentFrontmatter,
    pub body: String,
}

impl ContentStore {
    /// Write a signed comment file into a lifecycle directory.
    pub fn write_comment(
        &self,
        state: CommentState,
        front: &CommentFrontmatter,
        body: &str,
        keys: &SiteKeys,
    ) -> Result<String> {
        if body.trim().is_empty() {
            return Err(PolisError::validation("comment body is empty"));
        }
        let file = frontmatter::render(front, body)?;
        let signature = sign_content(file.as_bytes(), keys.signing_key());

        let path = self.paths().comment_file(state, &front.id);
        fsutil::write_atomic_str(&path.with_extension("md.sig"), &signature)?;
        fsutil::write_atomic_str(&path, &file)?;
        Ok(format!("comments/{}/{}.md", state.as_str(), front.id))
    }

    pub fn read_comment(&self, state: CommentState, id: &str) -> Result<Comment> {
        let path = self.paths().comment_file(state, id);
        if !path.exists() {
            return Err(PolisError::not_found(format!(
                "comment {id} in {}",
                state.as_str()
            )));
        }
        let content = fs::read_to_string(&path)?;
        let (front, body) = frontmatter::parse::<CommentFrontmatter>(&content)?;
        Ok(Comment {
            id: id.to_string(),
            state,
            rel_path: format!("comments/{}/{id}.md", state.as_str()),
            frontmatter: front,
            body: body.to_string(),
        })
    }

    /// Comment ids in a lifecycle directory, sorted for stable iteration.
    pub fn list_comment_ids(&self, state: CommentState) -> Result<Vec<String>> {
        let dir = self.paths().comments_dir(state);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(".md") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn list_comments(&self, state: CommentState) -> Result<Vec<Comment>> {
        self.list_comment_ids(state)?
            .iter()
            .map(|id| self.read_comment(state, id))
            .collect()
    }

    pub fn count_comments(&self, state: CommentState) -> Result<usize> {
        Ok(self.list_comment_ids(state)?.len())
    }

    /// Which lifecycle directory currently holds this comment, if any.
    pub fn locate_comment(&self, id: &str) -> Option<CommentState> {
        CommentState::ALL
            .into_iter()
            .find(|state| self.paths().comment_file(*state, id).exists())
    }

    /// Move a comment (and its signature) between lifecycle directories.
    pub fn move_comment(&self, id: &str, from: CommentState, to: CommentState) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let src = self.paths().comment_file(from, id);
        if !src.exists() {
            return Err(PolisError::not_found(format!(
                "comment {id} in {}",
                from.as_str()
            )));
        }
        let dst = self.paths().comment_file(to, id);
        fs::create_dir_all(self.paths().comments_dir(to))?;
        fs::rename(&src, &dst)?;

        let src_sig = src.with_extension("md.sig");
        if src_sig.exists() {
            fs::rename(&src_sig, dst.with_extension("md.sig"))?;
        } else {
            tracing::warn!(%id, from = from.as_str(), "comment moved without a signature file");
        }
        tracing::info!(%id, from = from.as_str(), to = to.as_str(), "comment transitioned");
        Ok(())
    }
}
