//! In-memory release source and recording progress sink.

use crate::core::{Result, RolloutError};
use crate::manifest::{FileEntry, Manifest, hash_bytes};
use crate::updater::{FileEvent, FileOutcome, ProgressSink, ReleaseSource};
use crate::version::Version;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A [`ReleaseSource`] serving releases of one program from memory.
///
/// Counts every `fetch_file` call so tests can assert on REUSE/FETCH decisions.
#[derive(Debug, Default)]
pub struct FakeSource {
    program: String,
    releases: BTreeMap<Version, BTreeMap<String, Vec<u8>>>,
    failing: HashSet<String>,
    unreachable: bool,
    fetches: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl FakeSource {
    /// Source for `program` with no releases.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            ..Self::default()
        }
    }

    /// Adds a release; paths are relative (`bin/app.dll`).
    ///
    /// # Panics
    ///
    /// Panics if `version` is not a valid version.
    #[must_use]
    pub fn with_release(mut self, version: &str, files: &[(&str, &str)]) -> Self {
        let version: Version = version.parse().expect("valid fixture version");
        let files = files
            .iter()
            .map(|(path, content)| (format!("/{path}"), content.as_bytes().to_vec()))
            .collect();
        self.releases.insert(version, files);
        self
    }

    /// Every download of `manifest_path` fails with a network error.
    #[must_use]
    pub fn failing(mut self, manifest_path: &str) -> Self {
        self.failing.insert(manifest_path.to_string());
        self
    }

    /// Every call fails with a network error.
    #[must_use]
    pub const fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Manifest of a release.
    ///
    /// # Panics
    ///
    /// Panics if the release was not added.
    pub fn manifest_of(&self, version: &Version) -> Manifest {
        let files = self.releases.get(version).expect("release exists");
        Manifest::from_entries(
            files.iter().map(|(path, content)| FileEntry::new(path, hash_bytes(content))).collect(),
        )
    }

    /// Number of `fetch_file` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Manifest paths requested through `fetch_file`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fetched_paths(&self) -> Vec<String> {
        self.fetched.lock().expect("fetch log").clone()
    }

    fn check_reachable(&self, operation: &str) -> Result<()> {
        if self.unreachable {
            return Err(RolloutError::network(operation, "connection refused"));
        }
        Ok(())
    }

    fn check_program(&self, program: &str) -> Result<()> {
        if program != self.program {
            return Err(RolloutError::ProgramNotFound {
                program: program.to_string(),
            });
        }
        Ok(())
    }
}

impl ReleaseSource for FakeSource {
    async fn latest_version(&self, program: &str) -> Result<Version> {
        self.check_reachable("fetch latest version")?;
        self.check_program(program)?;
        self.releases.keys().next_back().cloned().ok_or_else(|| RolloutError::NoVersions {
            program: program.to_string(),
        })
    }

    async fn manifest(&self, program: &str, version: &Version) -> Result<Manifest> {
        self.check_reachable("fetch manifest")?;
        self.check_program(program)?;
        if !self.releases.contains_key(version) {
            return Err(RolloutError::VersionNotFound {
                program: program.to_string(),
                version: version.to_string(),
            });
        }
        Ok(self.manifest_of(version))
    }

    async fn fetch_file(
        &self,
        program: &str,
        version: &Version,
        relative_path: &str,
        dest: &Path,
    ) -> Result<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(relative_path.to_string());
        }
        self.check_reachable("download file")?;
        self.check_program(program)?;

        let key = relative_path.replace('\\', "/");
        if self.failing.contains(&key) {
            return Err(RolloutError::network("download file", "connection reset"));
        }
        let content = self
            .releases
            .get(version)
            .and_then(|files| files.get(&key))
            .ok_or_else(|| RolloutError::FileNotFound {
                program: program.to_string(),
                version: version.to_string(),
                path: relative_path.to_string(),
            })?;
        tokio::fs::write(dest, content).await.map_err(|e| RolloutError::io("write", dest, &e))?;
        Ok(content.len() as u64)
    }
}

/// A [`ProgressSink`] that records every file event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, FileOutcome)>>,
}

impl RecordingSink {
    /// Recorded `(path, outcome)` pairs in completion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn outcomes(&self) -> Vec<(String, FileOutcome)> {
        self.events.lock().expect("event log").clone()
    }
}

impl ProgressSink for RecordingSink {
    fn file_done(&self, event: &FileEvent<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event.path.to_string(), event.outcome.clone()));
        }
    }
}
