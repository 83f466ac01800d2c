//! Atomic file writes.
//!
//! Every mutation goes through tmp-file-then-rename so a crash mid-write
//! never leaves half-committed state on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Write bytes to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write a string to `path` atomically.
pub fn write_atomic_str(path: &Path, content: &str) -> io::Result<()> {
    write_atomic(path, content.as_bytes())
}
