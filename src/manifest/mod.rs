//! Version manifests: the list of files in a published version and their content hashes.
//!
//! A manifest is what lets a client update incrementally. The server builds it
//! once at publish time and stores it as `FilesHash.json` in the version
//! record; the client compares each entry against its local install and only
//! downloads files whose hash differs.
//!
//! # Wire Format
//!
//! ```json
//! [
//!   { "relativePath": "/app.dll", "hash": "9f86d081884c7d659a2feaa0c55ad015" },
//!   { "relativePath": "/data/config.json", "hash": "44136fa355b3678a1146ad16f7e8649e" }
//! ]
//! ```
//!
//! Paths are relative to the version's `src` subtree, start with a single `/`
//! and use `/` separators. Sequence order carries no meaning; consumers look
//! entries up by path.
//!
//! # Modules
//!
//! - [`hash`] - Streaming content hash shared by server and client
//! - [`listing`] - Recursive listing that reports per-entry failures
//! - [`builder`] - Parallel manifest construction

pub mod builder;
pub mod hash;
pub mod listing;

pub use builder::{ManifestBuild, SkippedFile, build_manifest};
pub use hash::{hash_bytes, hash_file};

use crate::core::{Result, RolloutError};
use crate::utils::fs::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One file of a published version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Path relative to the source subtree, with a leading `/`.
    pub relative_path: String,
    /// Content hash, see [`hash::hash_file`].
    pub hash: String,
}

impl FileEntry {
    /// Create an entry.
    pub fn new(relative_path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            hash: hash.into(),
        }
    }
}

/// The file list of one published version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<FileEntry>,
}

impl Manifest {
    /// Build a manifest from entries, sorting them by path for stable output.
    #[must_use]
    pub fn from_entries(mut entries: Vec<FileEntry>) -> Self {
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Self {
            entries,
        }
    }

    /// All entries.
    #[must_use]
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the hash recorded for `relative_path`.
    #[must_use]
    pub fn hash_of(&self, relative_path: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.relative_path == relative_path).map(|e| e.hash.as_str())
    }

    /// Index of path to hash.
    #[must_use]
    pub fn index(&self) -> HashMap<&str, &str> {
        self.entries.iter().map(|e| (e.relative_path.as_str(), e.hash.as_str())).collect()
    }

    /// Order-independent comparison of the `{relativePath, hash}` pairs.
    #[must_use]
    pub fn same_entries(&self, other: &Self) -> bool {
        let ours: HashSet<&FileEntry> = self.entries.iter().collect();
        let theirs: HashSet<&FileEntry> = other.entries.iter().collect();
        ours == theirs
    }

    /// Parse a manifest from its JSON form.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| RolloutError::Other {
            message: format!("Invalid manifest: {e}"),
        })
    }

    /// Render the manifest as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RolloutError::Other {
            message: format!("Failed to serialize manifest: {e}"),
        })
    }

    /// Load a manifest file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RolloutError::io("read manifest", path, &e))?;
        Self::from_json(&content)
    }

    /// Write the manifest to disk atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.to_json()?.as_bytes())
    }
}
