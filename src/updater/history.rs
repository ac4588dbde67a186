//! Rollback history: `<appdata>/<program>/Versions/<version>/**`.
//!
//! Only directories whose name is a canonical version count as history
//! entries. Staging directories created next to them are hidden and are
//! ignored by [`RollbackHistory::versions`].

use crate::constants::STAGING_PREFIX;
use crate::core::{Result, RolloutError};
use crate::utils::fs::{StagingDir, copy_dir, ensure_dir, move_dir, remove_dir_all, run_blocking};
use crate::version::Version;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Previously applied versions of one program.
#[derive(Debug, Clone)]
pub struct RollbackHistory {
    dir: PathBuf,
}

impl RollbackHistory {
    /// History rooted at `dir` (the program's `Versions` directory).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// The history directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding the copy of `version`.
    #[must_use]
    pub fn version_dir(&self, version: &Version) -> PathBuf {
        self.dir.join(version.to_string())
    }

    /// Whether a copy of `version` is retained.
    pub async fn contains(&self, version: &Version) -> bool {
        tokio::fs::metadata(self.version_dir(version)).await.is_ok_and(|m| m.is_dir())
    }

    /// Retained versions, oldest first. A missing directory is an empty history.
    pub async fn versions(&self) -> Result<Vec<Version>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RolloutError::io("read history", &self.dir, &e)),
        };

        let mut versions = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| RolloutError::io("read history", &self.dir, &e))?
        {
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            if let (true, Some(version)) =
                (is_dir, entry.file_name().to_str().and_then(Version::from_dir_name))
            {
                versions.push(version);
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Creates the history directory.
    pub async fn ensure(&self) -> Result<()> {
        let dir = self.dir.clone();
        run_blocking(move || ensure_dir(&dir)).await
    }

    /// Copies `source` into the history as `version` unless it is already there.
    ///
    /// The copy is assembled under a staging name first, so an interrupted
    /// backup never shows up as a history entry.
    pub async fn capture(&self, version: &Version, source: &Path) -> Result<bool> {
        if self.contains(version).await {
            return Ok(false);
        }
        self.ensure().await?;

        let staging = StagingDir::new_in(&self.dir, "backup")?;
        let staged = staging.path().to_path_buf();
        let target = self.version_dir(version);
        let source = source.to_path_buf();
        run_blocking(move || {
            copy_dir(&source, &staged)?;
            move_dir(&staged, &target)
        })
        .await?;
        staging.keep();

        info!("Captured rollback copy of {} in {}", version, self.dir.display());
        Ok(true)
    }

    /// Removes the copy of `version`, if any.
    pub async fn remove(&self, version: &Version) -> Result<()> {
        let dir = self.version_dir(version);
        run_blocking(move || remove_dir_all(&dir)).await
    }

    /// Removes leftovers of interrupted applies and backups.
    pub async fn clean_staging(&self) -> Result<usize> {
        let dir = self.dir.clone();
        run_blocking(move || {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
                Err(e) => return Err(RolloutError::io("read history", &dir, &e)),
            };
            let mut removed = 0;
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                    remove_dir_all(&entry.path())?;
                    removed += 1;
                }
            }
            if removed > 0 {
                debug!("Removed {} stale staging directories from {}", removed, dir.display());
            }
            Ok(removed)
        })
        .await
    }

    /// Evicts the oldest copies so at most `retention` remain.
    ///
    /// `current` is never evicted; it takes one of the `retention` slots.
    /// Returns the evicted versions, oldest first.
    pub async fn prune(&self, retention: usize, current: &Version) -> Result<Vec<Version>> {
        let versions = self.versions().await?;
        let evicted = eviction_plan(&versions, retention, current);
        for version in &evicted {
            self.remove(version).await?;
            info!("Evicted rollback copy of {}", version);
        }
        Ok(evicted)
    }
}

/// Versions to evict from `versions` (sorted ascending), oldest first.
fn eviction_plan(versions: &[Version], retention: usize, current: &Version) -> Vec<Version> {
    let retention = retention.max(1);
    let has_current = versions.contains(current);
    let other_slots = if has_current { retention - 1 } else { retention };

    let others: Vec<&Version> = versions.iter().filter(|v| *v != current).collect();
    let evict_count = others.len().saturating_sub(other_slots);
    others.into_iter().take(evict_count).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn vs(list: &[&str]) -> Vec<Version> {
        list.iter().map(|s| v(s)).collect()
    }

    #[test]
    fn test_eviction_plan_keeps_newest() {
        let versions = vs(&["1.0.0.0", "1.0.0.1", "1.0.0.2", "1.0.0.3", "1.0.0.4", "1.0.0.5"]);
        assert_eq!(
            eviction_plan(&versions, 4, &v("1.0.0.5")),
            vs(&["1.0.0.0", "1.0.0.1"])
        );
    }

    #[test]
    fn test_eviction_plan_keeps_current_regardless_of_age() {
        let versions = vs(&["1.0.0.0", "1.0.0.1", "1.0.0.2", "1.0.0.3"]);
        // Rolled back to the oldest version
        assert_eq!(
            eviction_plan(&versions, 2, &v("1.0.0.0")),
            vs(&["1.0.0.1", "1.0.0.2"])
        );
    }

    #[test]
    fn test_eviction_plan_under_limit() {
        let versions = vs(&["1.0.0.0", "1.0.0.1"]);
        assert!(eviction_plan(&versions, 4, &v("1.0.0.1")).is_empty());
        assert_eq!(eviction_plan(&versions, 1, &v("1.0.0.1")), vs(&["1.0.0.0"]));
    }

    #[tokio::test]
    async fn test_versions_ignores_non_versions() {
        let temp = TempDir::new().unwrap();
        for name in ["1.0.0.0", "1.0.0.10", "1.0.0.2", ".staging-x", "notes", "01.0.0.0"] {
            fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        fs::write(temp.path().join("2.0.0.0"), "a file").unwrap();

        let history = RollbackHistory::new(temp.path());
        assert_eq!(history.versions().await.unwrap(), vs(&["1.0.0.0", "1.0.0.2", "1.0.0.10"]));
        assert!(RollbackHistory::new(temp.path().join("missing")).versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capture_and_prune() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        fs::create_dir_all(install.join("bin")).unwrap();
        fs::write(install.join("bin/app.dll"), "v1").unwrap();
        let history = RollbackHistory::new(temp.path().join("Versions"));

        assert!(history.capture(&v("1.0.0.0"), &install).await.unwrap());
        assert!(!history.capture(&v("1.0.0.0"), &install).await.unwrap());
        assert_eq!(
            fs::read_to_string(history.version_dir(&v("1.0.0.0")).join("bin/app.dll")).unwrap(),
            "v1"
        );

        for version in ["1.0.0.1", "1.0.0.2", "1.0.0.3"] {
            history.capture(&v(version), &install).await.unwrap();
        }
        let evicted = history.prune(2, &v("1.0.0.3")).await.unwrap();
        assert_eq!(evicted, vs(&["1.0.0.0", "1.0.0.1"]));
        assert_eq!(history.versions().await.unwrap(), vs(&["1.0.0.2", "1.0.0.3"]));
    }

    #[tokio::test]
    async fn test_clean_staging() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".staging-1.0.0.1-abc")).unwrap();
        fs::create_dir_all(temp.path().join("1.0.0.0")).unwrap();
        let history = RollbackHistory::new(temp.path());

        assert_eq!(history.clean_staging().await.unwrap(), 1);
        assert_eq!(history.versions().await.unwrap(), vs(&["1.0.0.0"]));
        assert!(!temp.path().join(".staging-1.0.0.1-abc").exists());
    }
}
