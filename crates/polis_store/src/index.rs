//! metadata/public.jsonl: one JSON object per line.
//!
//! Appends and rewrites are serialized through the store's index lock; reads
//! parse a consistent snapshot without taking it.

use std::fs;

use polis_protocol::{PublicIndexEntry, Result};

use crate::fsutil;
use crate::ContentStore;

impl ContentStore {
    /// All index entries in file order.
    pub fn read_index(&self) -> Result<Vec<PublicIndexEntry>> {
        let path = self.paths().public_index();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)?;
        let mut entries = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }

    pub fn count_posts(&self) -> Result<usize> {
        Ok(self.read_index()?.len())
    }

    pub(crate) fn append_index_entry(&self, entry: &PublicIndexEntry) -> Result<()> {
        let _guard = self.index_lock.lock().expect("index lock poisoned");
        let path = self.paths().public_index();
        let mut raw = if path.exists() {
            fs::read_to_string(&path)?
        } else {
            String::new()
        };
        if !raw.is_empty() && !raw.ends_with('\n') {
            raw.push('\n');
        }
        raw.push_str(&serde_json::to_string(entry)?);
        raw.push('\n');
        fsutil::write_atomic_str(&path, &raw)?;
        Ok(())
    }

    /// Replace the entry for `entry.path`: read-all, filter, append-updated,
    /// atomic rewrite.
    pub(crate) fn replace_index_entry(&self, entry: &PublicIndexEntry) -> Result<()> {
        let _guard = self.index_lock.lock().expect("index lock poisoned");
        let path = self.paths().public_index();
        let mut entries: Vec<PublicIndexEntry> = Vec::new();
        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            for line in raw.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let existing: PublicIndexEntry = serde_json::from_str(line)?;
                if existing.path != entry.path {
                    entries.push(existing);
                }
            }
        }
        entries.push(entry.clone());

        let mut raw = String::new();
        for item in &entries {
            raw.push_str(&serde_json::to_string(item)?);
            raw.push('\n');
        }
        fsutil::write_atomic_str(&path, &raw)?;
        Ok(())
    }
}
