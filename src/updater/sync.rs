//! File Sync Engine.
//!
//! For each manifest entry the engine decides:
//!
//! - **REUSE**: a file exists at the same path in the live install and its
//!   hash equals the manifest hash. It is *copied* into staging; the live
//!   install is never modified here.
//! - **FETCH**: anything else (missing, different, unreadable). It is
//!   downloaded into staging and its hash checked against the manifest.
//!
//! Entries are processed concurrently up to the configured limit. A failed
//! entry is reported to the [`ProgressSink`] and recorded in the
//! [`SyncReport`]; the remaining entries still run.

use super::{ProgressSink, ReleaseSource};
use crate::core::{Result, RolloutError};
use crate::manifest::hash::is_valid_hash;
use crate::manifest::{FileEntry, Manifest, hash_file};
use crate::utils::path_validation::manifest_path_to_relative;
use crate::version::Version;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Per-file result of a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Downloaded from the server.
    Fetched,
    /// Copied from the live install.
    Reused,
    /// Could not be staged.
    Failed(String),
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetched => f.write_str("fetched"),
            Self::Reused => f.write_str("reused"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Progress notification for one finished entry.
#[derive(Debug, Clone, Copy)]
pub struct FileEvent<'a> {
    /// Manifest path of the entry.
    pub path: &'a str,
    /// What happened to it.
    pub outcome: &'a FileOutcome,
    /// Entries finished so far, including this one.
    pub completed: usize,
    /// Entries in the pass.
    pub total: usize,
}

/// Summary of a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Manifest paths downloaded from the server.
    pub fetched: Vec<String>,
    /// Manifest paths copied from the live install.
    pub reused: Vec<String>,
    /// Manifest paths that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    /// Number of entries processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.fetched.len() + self.reused.len() + self.failed.len()
    }

    /// Whether every entry was staged.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// `Ok` when complete, otherwise [`RolloutError::PartialSync`].
    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        Err(RolloutError::PartialSync {
            failed: self.failed.iter().map(|(path, _)| path.clone()).collect(),
            total: self.total(),
        })
    }

    fn record(&mut self, path: String, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Fetched => self.fetched.push(path),
            FileOutcome::Reused => self.reused.push(path),
            FileOutcome::Failed(reason) => self.failed.push((path, reason)),
        }
    }
}

/// Stages a version's files from the live install and the server.
#[derive(Debug)]
pub struct SyncEngine<'a, S> {
    source: &'a S,
    concurrency: usize,
}

impl<'a, S: ReleaseSource> SyncEngine<'a, S> {
    /// Engine fetching from `source` with at most `concurrency` files in flight.
    pub fn new(source: &'a S, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Populates `staging_dir` with every file of `manifest`.
    ///
    /// Never fails as a whole; inspect the report for per-file failures.
    pub async fn sync(
        &self,
        program: &str,
        version: &Version,
        manifest: &Manifest,
        install_dir: &Path,
        staging_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> SyncReport {
        let total = manifest.len();
        sink.sync_started(version, total);

        let mut results = stream::iter(manifest.entries())
            .map(|entry| async move {
                let outcome =
                    self.stage_entry(program, version, entry, install_dir, staging_dir).await;
                (entry.relative_path.as_str(), outcome)
            })
            .buffer_unordered(self.concurrency);

        let mut report = SyncReport::default();
        let mut completed = 0;
        while let Some((path, outcome)) = results.next().await {
            completed += 1;
            if let FileOutcome::Failed(reason) = &outcome {
                warn!("Failed to stage {}: {}", path, reason);
            }
            sink.file_done(&FileEvent {
                path,
                outcome: &outcome,
                completed,
                total,
            });
            report.record(path.to_string(), outcome);
        }

        debug!(
            "Sync of {} {}: {} fetched, {} reused, {} failed",
            program,
            version,
            report.fetched.len(),
            report.reused.len(),
            report.failed.len()
        );
        sink.sync_finished(&report);
        report
    }

    async fn stage_entry(
        &self,
        program: &str,
        version: &Version,
        entry: &FileEntry,
        install_dir: &Path,
        staging_dir: &Path,
    ) -> FileOutcome {
        let relative = match manifest_path_to_relative(&entry.relative_path) {
            Ok(relative) => relative,
            Err(e) => return FileOutcome::Failed(e.to_string()),
        };
        // A malformed hash can never match, so skip the download.
        if !is_valid_hash(&entry.hash) {
            return FileOutcome::Failed(format!("malformed content hash {:?}", entry.hash));
        }
        let local = install_dir.join(&relative);
        let staged = staging_dir.join(&relative);

        if let Some(parent) = staged.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return FileOutcome::Failed(format!("create {}: {e}", parent.display()));
        }

        if local_hash(&local).await.as_deref() == Some(entry.hash.as_str()) {
            match tokio::fs::copy(&local, &staged).await {
                Ok(_) => return FileOutcome::Reused,
                Err(e) => debug!("Could not reuse {}, fetching instead: {}", local.display(), e),
            }
        }

        if let Err(e) =
            self.source.fetch_file(program, version, &entry.relative_path, &staged).await
        {
            return FileOutcome::Failed(e.to_string());
        }
        match local_hash(&staged).await {
            Some(hash) if hash == entry.hash => FileOutcome::Fetched,
            Some(hash) => FileOutcome::Failed(format!(
                "hash mismatch after download: expected {}, got {hash}",
                entry.hash
            )),
            None => FileOutcome::Failed("downloaded file is unreadable".to_string()),
        }
    }
}

/// Hash of a local file, `None` if it is missing or unreadable.
async fn local_hash(path: &Path) -> Option<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if !path.is_file() {
            return None;
        }
        hash_file(&path).ok()
    })
    .await
    .ok()
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::hash_bytes;
    use crate::test_utils::{FakeSource, RecordingSink};
    use std::fs;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    struct Dirs {
        _temp: TempDir,
        install: PathBuf,
        staging: PathBuf,
    }

    fn dirs() -> Dirs {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        let staging = temp.path().join("staging");
        fs::create_dir_all(&install).unwrap();
        fs::create_dir_all(&staging).unwrap();
        Dirs {
            _temp: temp,
            install,
            staging,
        }
    }

    #[tokio::test]
    async fn test_matching_local_file_is_reused_without_download() {
        let dirs = dirs();
        fs::write(dirs.install.join("app.dll"), "same").unwrap();
        let source = FakeSource::new("P").with_release("1.0.0.1", &[("app.dll", "same")]);
        let manifest = source.manifest_of(&v("1.0.0.1"));
        let sink = RecordingSink::default();

        let report = SyncEngine::new(&source, 4)
            .sync("P", &v("1.0.0.1"), &manifest, &dirs.install, &dirs.staging, &sink)
            .await;

        assert_eq!(report.reused, vec!["/app.dll".to_string()]);
        assert!(report.fetched.is_empty());
        assert_eq!(source.fetch_count(), 0);
        assert_eq!(fs::read_to_string(dirs.staging.join("app.dll")).unwrap(), "same");
        // Reuse copies, the live file stays
        assert!(dirs.install.join("app.dll").exists());
        assert_eq!(sink.outcomes(), vec![("/app.dll".to_string(), FileOutcome::Reused)]);
    }

    #[tokio::test]
    async fn test_changed_or_missing_files_are_fetched() {
        let dirs = dirs();
        fs::write(dirs.install.join("app.dll"), "old").unwrap();
        let source = FakeSource::new("P")
            .with_release("1.0.0.1", &[("app.dll", "new"), ("lib/extra.dll", "extra")]);
        let manifest = source.manifest_of(&v("1.0.0.1"));

        let report = SyncEngine::new(&source, 2)
            .sync("P", &v("1.0.0.1"), &manifest, &dirs.install, &dirs.staging, &RecordingSink::default())
            .await;

        assert!(report.is_complete());
        assert_eq!(report.fetched.len(), 2);
        assert_eq!(source.fetch_count(), 2);
        let mut requested = source.fetched_paths();
        requested.sort();
        assert_eq!(requested, vec!["/app.dll", "/lib/extra.dll"]);
        assert_eq!(fs::read_to_string(dirs.staging.join("app.dll")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dirs.staging.join("lib/extra.dll")).unwrap(), "extra");
        assert_eq!(fs::read_to_string(dirs.install.join("app.dll")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_stop_other_files() {
        let dirs = dirs();
        let source = FakeSource::new("P")
            .with_release("2.0.0.0", &[("a.dll", "a"), ("b.dll", "b"), ("c.dll", "c")])
            .failing("/b.dll");
        let manifest = source.manifest_of(&v("2.0.0.0"));
        let sink = RecordingSink::default();

        let report = SyncEngine::new(&source, 1)
            .sync("P", &v("2.0.0.0"), &manifest, &dirs.install, &dirs.staging, &sink)
            .await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.fetched.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "/b.dll");
        assert!(dirs.staging.join("a.dll").exists());
        assert!(dirs.staging.join("c.dll").exists());

        let err = report.ensure_complete().unwrap_err();
        assert_eq!(
            err,
            RolloutError::PartialSync {
                failed: vec!["/b.dll".to_string()],
                total: 3
            }
        );
        assert!(matches!(
            sink.outcomes().iter().find(|(p, _)| p == "/b.dll").map(|(_, o)| o),
            Some(FileOutcome::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_download_is_failed() {
        let dirs = dirs();
        let source = FakeSource::new("P").with_release("1.0.0.0", &[("a.dll", "a")]);
        let manifest = Manifest::from_entries(vec![FileEntry::new("/a.dll", hash_bytes(b"not a"))]);

        let report = SyncEngine::new(&source, 1)
            .sync("P", &v("1.0.0.0"), &manifest, &dirs.install, &dirs.staging, &RecordingSink::default())
            .await;

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("hash mismatch"));
    }

    #[tokio::test]
    async fn test_backslash_manifest_paths() {
        let dirs = dirs();
        fs::create_dir_all(dirs.install.join("bin")).unwrap();
        fs::write(dirs.install.join("bin/app.dll"), "abc123").unwrap();
        let source = FakeSource::new("P").with_release("1.0.0.1", &[("bin/app.dll", "abc123")]);
        let manifest =
            Manifest::from_entries(vec![FileEntry::new("\\bin\\app.dll", hash_bytes(b"abc123"))]);

        let report = SyncEngine::new(&source, 1)
            .sync("P", &v("1.0.0.1"), &manifest, &dirs.install, &dirs.staging, &RecordingSink::default())
            .await;

        assert_eq!(report.reused, vec!["\\bin\\app.dll".to_string()]);
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_hash_fails_without_download() {
        let dirs = dirs();
        fs::write(dirs.install.join("a.dll"), "a").unwrap();
        let source = FakeSource::new("P").with_release("1.0.0.0", &[("a.dll", "a"), ("b.dll", "b")]);
        let manifest = Manifest::from_entries(vec![
            FileEntry::new("/a.dll", hash_bytes(b"a").to_uppercase()),
            FileEntry::new("/b.dll", "abc123"),
        ]);

        let report = SyncEngine::new(&source, 1)
            .sync("P", &v("1.0.0.0"), &manifest, &dirs.install, &dirs.staging, &RecordingSink::default())
            .await;

        assert_eq!(report.failed.len(), 2);
        assert!(report.failed.iter().all(|(_, reason)| reason.contains("malformed")));
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_unsafe_manifest_path_fails_entry() {
        let dirs = dirs();
        let source = FakeSource::new("P").with_release("1.0.0.0", &[]);
        let manifest =
            Manifest::from_entries(vec![FileEntry::new("/../escape.dll", hash_bytes(b"x"))]);

        let report = SyncEngine::new(&source, 1)
            .sync("P", &v("1.0.0.0"), &manifest, &dirs.install, &dirs.staging, &RecordingSink::default())
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(source.fetch_count(), 0);
    }
}
