//! Recursive file listing that reports failures instead of swallowing them.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A directory entry that could not be listed or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingError {
    /// Path that failed, when known.
    pub path: PathBuf,
    /// Human readable reason.
    pub reason: String,
}

/// Result of walking a tree: the files found plus every per-entry failure.
#[derive(Debug, Default)]
pub struct TreeListing {
    /// Regular files, relative to the walked root.
    pub files: Vec<PathBuf>,
    /// Entries that could not be read. The walk continues past them.
    pub errors: Vec<ListingError>,
}

/// Lists every regular file under `root`.
///
/// Symlinks are not followed. Failures on individual directories are
/// collected in [`TreeListing::errors`] and the rest of the tree is still
/// listed. Files are returned sorted by path.
pub fn list_files(root: &Path) -> TreeListing {
    let mut listing = TreeListing::default();

    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => match entry.path().strip_prefix(root) {
                Ok(relative) => listing.files.push(relative.to_path_buf()),
                Err(e) => listing.errors.push(ListingError {
                    path: entry.path().to_path_buf(),
                    reason: e.to_string(),
                }),
            },
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                tracing::warn!("Failed to list {}: {}", path.display(), e);
                listing.errors.push(ListingError {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    listing.files.sort();
    listing
}
