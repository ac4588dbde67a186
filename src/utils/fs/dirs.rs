//! Directory operations for creating, copying, clearing, moving and removing trees.
//!
//! These are synchronous `std::fs` helpers. Async callers run them through
//! `tokio::task::spawn_blocking` when a whole tree is involved.

use crate::core::{Result, RolloutError};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Ensures a directory exists, creating it and all parent directories if necessary.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or creation fails.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| RolloutError::io("create directory", path, &e))?;
    } else if !path.is_dir() {
        return Err(RolloutError::Io {
            operation: "create directory".to_string(),
            path: path.display().to_string(),
            reason: "path exists but is not a directory".to_string(),
        });
    }
    Ok(())
}

/// Ensures that the parent directory of a file path exists.
///
/// Concurrent callers racing to create the same parent is fine:
/// `create_dir_all` treats an already existing directory as success.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Recursively copies a directory and all its contents to a new location.
///
/// Creates `dst` if needed and overwrites existing files. Only regular files
/// and directories are copied; symlinks and special files are skipped.
///
/// # Returns
///
/// The number of files copied.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<u64> {
    ensure_dir(dst)?;

    let mut copied = 0;
    for entry in
        fs::read_dir(src).map_err(|e| RolloutError::io("read directory", src, &e))?
    {
        let entry = entry.map_err(|e| RolloutError::io("read directory", src, &e))?;
        let file_type =
            entry.file_type().map_err(|e| RolloutError::io("read file type", &entry.path(), &e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copied += copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path)
                .map_err(|e| RolloutError::io("copy file", &src_path, &e))?;
            copied += 1;
        }
        // Skip symlinks and other file types
    }

    Ok(copied)
}

/// Recursively removes a directory and all its contents.
///
/// A missing directory is not an error.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| RolloutError::io("remove directory", path, &e))?;
    }
    Ok(())
}

/// Removes every child of `path`, leaving the (now empty) directory in place.
///
/// Creates the directory when it does not exist yet, so a first-time install
/// path can be cleared and populated the same way as an existing one.
pub fn clear_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return ensure_dir(path);
    }

    for entry in fs::read_dir(path).map_err(|e| RolloutError::io("read directory", path, &e))? {
        let entry = entry.map_err(|e| RolloutError::io("read directory", path, &e))?;
        let child = entry.path();
        let file_type =
            entry.file_type().map_err(|e| RolloutError::io("read file type", &child, &e))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&child)
                .map_err(|e| RolloutError::io("remove directory", &child, &e))?;
        } else {
            fs::remove_file(&child).map_err(|e| RolloutError::io("remove file", &child, &e))?;
        }
    }
    Ok(())
}

/// Returns `true` when the directory exists and has no entries.
pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).map(|mut entries| entries.next().is_none()).unwrap_or(false)
}

/// File count and total byte size of a tree, used to verify copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeSummary {
    /// Number of regular files.
    pub files: u64,
    /// Sum of regular file sizes in bytes.
    pub bytes: u64,
}

/// Summarizes the regular files under `root`.
pub fn tree_summary(root: &Path) -> Result<TreeSummary> {
    let mut summary = TreeSummary::default();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| RolloutError::Io {
            operation: "walk directory".to_string(),
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            let metadata = entry
                .metadata()
                .map_err(|e| RolloutError::Io {
                    operation: "read metadata".to_string(),
                    path: entry.path().display().to_string(),
                    reason: e.to_string(),
                })?;
            summary.files += 1;
            summary.bytes += metadata.len();
        }
    }
    Ok(summary)
}

/// Moves a directory to `dst`, which must not exist yet.
///
/// Uses a plain `rename` when source and destination share a filesystem. A
/// cross-device rename falls back to copy, verify (same file count and total
/// size) and delete of the source. If verification fails, the partial copy is
/// removed and the source is left in place.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        return Err(RolloutError::Io {
            operation: "move directory".to_string(),
            path: dst.display().to_string(),
            reason: "destination already exists".to_string(),
        });
    }
    ensure_parent_dir(dst)?;

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("Cross-device move from {} to {}, copying", src.display(), dst.display());
            copy_then_remove(src, dst)
        }
        Err(e) => Err(RolloutError::io("move directory", src, &e)),
    }
}

fn copy_then_remove(src: &Path, dst: &Path) -> Result<()> {
    let expected = tree_summary(src)?;
    copy_dir(src, dst)?;
    let actual = tree_summary(dst)?;

    if expected != actual {
        warn!(
            "Copy verification failed for {}: expected {:?}, got {:?}",
            dst.display(),
            expected,
            actual
        );
        remove_dir_all(dst)?;
        return Err(RolloutError::Io {
            operation: "move directory".to_string(),
            path: dst.display().to_string(),
            reason: "copied tree does not match source".to_string(),
        });
    }

    remove_dir_all(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir() {
        let temp = tempdir().unwrap();
        let test_dir = temp.path().join("a/b/c");

        assert!(!test_dir.exists());
        ensure_dir(&test_dir).unwrap();
        assert!(test_dir.is_dir());

        // Idempotent
        ensure_dir(&test_dir).unwrap();
    }

    #[test]
    fn test_ensure_dir_on_file_fails() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(ensure_dir(&file).is_err());
    }

    #[test]
    fn test_copy_dir_counts_files() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested/deep")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/b.txt"), "bb").unwrap();
        fs::write(src.join("nested/deep/c.txt"), "ccc").unwrap();

        let dst = temp.path().join("dst");
        let copied = copy_dir(&src, &dst).unwrap();

        assert_eq!(copied, 3);
        assert_eq!(fs::read_to_string(dst.join("nested/deep/c.txt")).unwrap(), "ccc");
        assert_eq!(
            tree_summary(&dst).unwrap(),
            TreeSummary {
                files: 3,
                bytes: 6,
            }
        );
    }

    #[test]
    fn test_clear_dir_keeps_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("install");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("app.dll"), "x").unwrap();
        fs::write(root.join("sub/data.bin"), "y").unwrap();

        clear_dir(&root).unwrap();

        assert!(root.is_dir());
        assert!(is_empty_dir(&root));
    }

    #[test]
    fn test_clear_dir_creates_missing() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("fresh");

        clear_dir(&root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_remove_dir_all_missing_is_ok() {
        let temp = tempdir().unwrap();
        remove_dir_all(&temp.path().join("missing")).unwrap();
    }

    #[test]
    fn test_move_dir() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("staging");
        fs::create_dir_all(src.join("src")).unwrap();
        fs::write(src.join("src/a.txt"), "a").unwrap();

        let dst = temp.path().join("1.0.0.0");
        move_dir(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("src/a.txt")).unwrap(), "a");
    }

    #[test]
    fn test_move_dir_refuses_existing_destination() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a");
        let dst = temp.path().join("b");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();

        assert!(move_dir(&src, &dst).is_err());
        assert!(src.exists());
    }

    #[test]
    fn test_copy_then_remove() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("x")).unwrap();
        fs::write(src.join("x/1.bin"), [0u8; 16]).unwrap();

        let dst = temp.path().join("dst");
        copy_then_remove(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(dst.join("x/1.bin")).unwrap().len(), 16);
    }
}
