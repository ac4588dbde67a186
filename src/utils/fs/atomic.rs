//! Atomic file writes.
//!
//! A reader never observes a half-written file: content goes to a temporary
//! file in the destination directory, is synced, and then renamed over the
//! target.

use crate::core::{Result, RolloutError};
use crate::utils::fs::dirs::ensure_dir;
use std::io::Write;
use std::path::Path;

/// Writes `content` to `path` atomically, creating parent directories as needed.
///
/// # Guarantees
///
/// - **Atomicity**: the file at `path` is either the old or the new content
/// - **Durability**: content is synced to disk before the rename
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| RolloutError::io("create temp file", parent, &e))?;
    temp.write_all(content).map_err(|e| RolloutError::io("write temp file", temp.path(), &e))?;
    temp.as_file().sync_all().map_err(|e| RolloutError::io("sync temp file", temp.path(), &e))?;

    temp.persist(path).map_err(|e| RolloutError::io("rename temp file", path, &e.error))?;
    Ok(())
}
