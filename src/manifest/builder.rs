//! Manifest Builder: hashes every file of a source subtree in parallel.

use super::hash::hash_file;
use super::listing::list_files;
use super::{FileEntry, Manifest};
use crate::core::{Result, RolloutError};
use crate::utils::path_validation::to_manifest_path;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file that was left out of a manifest because it could not be listed or hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path of the file or directory, relative to the build root when possible.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of a manifest build.
///
/// Building is best-effort: a file that cannot be hashed is recorded in
/// `skipped` and the rest of the tree is still processed. Callers decide
/// whether a non-empty `skipped` list is acceptable; publishing rejects it.
#[derive(Debug, Default)]
pub struct ManifestBuild {
    /// Entries for every successfully hashed file, sorted by path.
    pub manifest: Manifest,
    /// Files and directories that were not included.
    pub skipped: Vec<SkippedFile>,
}

impl ManifestBuild {
    /// Returns `true` when every file under the root made it into the manifest.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Converts an incomplete build into an error naming the skipped files.
    pub fn into_complete(self) -> Result<Manifest> {
        if self.is_complete() {
            return Ok(self.manifest);
        }
        let names: Vec<String> =
            self.skipped.iter().map(|s| format!("{} ({})", s.path.display(), s.reason)).collect();
        Err(RolloutError::Io {
            operation: "build manifest".to_string(),
            path: names.join(", "),
            reason: format!("{} file(s) could not be hashed", self.skipped.len()),
        })
    }
}

/// Builds the manifest for the tree under `root`.
///
/// Hashing fans out over blocking worker threads, at most `concurrency` at a
/// time, and fans back in to a manifest sorted by relative path.
///
/// # Errors
///
/// Fails only when `root` is not a directory. Per-file problems end up in
/// [`ManifestBuild::skipped`].
pub async fn build_manifest(root: &Path, concurrency: usize) -> Result<ManifestBuild> {
    if !root.is_dir() {
        return Err(RolloutError::Io {
            operation: "build manifest".to_string(),
            path: root.display().to_string(),
            reason: "source directory does not exist".to_string(),
        });
    }

    let listing_root = root.to_path_buf();
    let listing = tokio::task::spawn_blocking(move || list_files(&listing_root))
        .await
        .map_err(|e| RolloutError::Other {
            message: format!("Task join error while listing files: {e}"),
        })?;

    let mut skipped: Vec<SkippedFile> = listing
        .errors
        .into_iter()
        .map(|e| SkippedFile {
            path: e.path,
            reason: e.reason,
        })
        .collect();

    let total = listing.files.len();
    let results: Vec<(PathBuf, std::result::Result<String, String>)> =
        stream::iter(listing.files)
            .map(|relative| {
                let absolute = root.join(&relative);
                async move {
                    let hashed = tokio::task::spawn_blocking(move || hash_file(&absolute))
                        .await
                        .map_err(|e| format!("hash task failed: {e}"))
                        .and_then(|r| r.map_err(|e| e.to_string()));
                    (relative, hashed)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut entries = Vec::with_capacity(total);
    for (relative, hashed) in results {
        match hashed {
            Ok(hash) => entries.push(FileEntry::new(to_manifest_path(&relative), hash)),
            Err(reason) => {
                warn!("Skipping {} in manifest: {}", relative.display(), reason);
                skipped.push(SkippedFile {
                    path: relative,
                    reason,
                });
            }
        }
    }

    let manifest = Manifest::from_entries(entries);
    debug!(
        "Built manifest for {}: {} entries, {} skipped",
        root.display(),
        manifest.len(),
        skipped.len()
    );

    Ok(ManifestBuild {
        manifest,
        skipped,
    })
}
