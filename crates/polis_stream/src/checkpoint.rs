//! Per-handler cursor + state persistence.
//!
//! One atomic {cursor, state} blob per handler under
//! .polis/stream/<domain>/<handler>/state.json. A crash can never leave the
//! cursor and state out of step.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Mutex;

use polis_protocol::{Result, SitePaths};
use polis_store::fsutil;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerCheckpoint {
    pub cursor: String,
    pub state: serde_json::Value,
}

/// Single-writer store for handler checkpoints; readers parse a snapshot
/// without the lock.
#[derive(Debug)]
pub struct CheckpointStore {
    paths: SitePaths,
    domain: String,
    lock: Mutex<()>,
}

impl CheckpointStore {
    pub fn new(paths: SitePaths, domain: impl Into<String>) -> Self {
        Self {
            paths,
            domain: domain.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn load(&self, handler: &str) -> Result<Option<HandlerCheckpoint>> {
        let path = self.paths.stream_state(&self.domain, handler);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Deserialize just the state portion of a checkpoint.
    pub fn load_state<T: DeserializeOwned>(&self, handler: &str) -> Result<Option<T>> {
        match self.load(handler)? {
            Some(checkpoint) => Ok(Some(serde_json::from_value(checkpoint.state)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, handler: &str, checkpoint: &HandlerCheckpoint) -> Result<()> {
        let _guard = self.lock.lock().expect("checkpoint lock poisoned");
        let path = self.paths.stream_state(&self.domain, handler);
        fsutil::write_atomic_str(&path, &serde_json::to_string_pretty(checkpoint)?)?;
        Ok(())
    }

    /// Drop a handler's checkpoint so the next run replays from the start.
    pub fn reset(&self, handler: &str) -> Result<()> {
        let _guard = self.lock.lock().expect("checkpoint lock poisoned");
        let path = self.paths.stream_state(&self.domain, handler);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
