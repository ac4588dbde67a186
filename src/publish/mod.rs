//! Publish Pipeline: turning a release bundle into a published VersionRecord.
//!
//! # Pipeline
//!
//! 1. **Authorize**: the presented login/password must equal the configured
//!    pair. A mismatch returns [`RolloutError::Unauthorized`] before anything
//!    touches the store.
//! 2. **Validate**: program name, version and installer file name.
//! 3. **Stage**: a hidden `.staging-<version>-<uuid>` directory is created in
//!    the program directory. The source archive is extracted into `src/`, the
//!    installer and `changelog.txt` are written next to it.
//! 4. **Manifest**: `FilesHash.json` is built over `src/` and persisted into
//!    staging. Any file that could not be hashed fails the publish.
//! 5. **Promote**: an existing record for the same version is renamed aside,
//!    staging is renamed to the final version name, and the superseded record
//!    is deleted.
//!
//! A failure in steps 3 and 4 removes the staging directory and, if the
//! program has no published version left, the program directory too. Readers
//! only ever see complete records.
//!
//! # Concurrency
//!
//! Publishes of different versions never share a directory name until the
//! final rename. Publishes and deletes of the same `program/version` key are
//! serialized with an in-process async mutex per key.

mod archive;

pub use archive::extract_zip;

use crate::config::Credentials;
use crate::constants::{CHANGELOG_FILE, MANIFEST_FILE, RETIRED_PREFIX, SOURCE_DIR};
use crate::core::{Result, RolloutError};
use crate::manifest::build_manifest;
use crate::registry::Registry;
use crate::utils::fs::{StagingDir, ensure_dir, is_empty_dir, remove_dir_all, run_blocking};
use crate::utils::path_validation::{parse_version_param, sanitize_file_name};
use crate::version::Version;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// An uploaded file that has already been spooled to local disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as provided by the uploader.
    pub file_name: String,
    /// Where the bytes currently live.
    pub path: PathBuf,
}

/// Everything needed to publish one version.
#[derive(Debug, Clone)]
pub struct ReleaseBundle {
    /// Target program name.
    pub program: String,
    /// Target version, unparsed.
    pub version: String,
    /// ZIP archive with the program files.
    pub source_archive: PathBuf,
    /// Installer artifact, stored under its own file name.
    pub installer: UploadedFile,
    /// Changelog text file. A missing changelog is stored as an empty one.
    pub changelog: Option<PathBuf>,
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Program name.
    pub program: String,
    /// Published version.
    pub version: Version,
    /// Number of entries in the manifest.
    pub files: usize,
    /// Whether an existing record of the same version was superseded.
    pub replaced: bool,
}

/// Write side of the program store.
///
/// Configured credentials are not stored here; each mutating call receives
/// them alongside the presented ones.
#[derive(Debug)]
pub struct Publisher {
    registry: Registry,
    hash_concurrency: usize,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Publisher {
    /// Create a publisher over the registry's store.
    pub fn new(registry: Registry, hash_concurrency: usize) -> Self {
        Self {
            registry,
            hash_concurrency: hash_concurrency.max(1),
            locks: DashMap::new(),
        }
    }

    /// The underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Publishes a release bundle.
    ///
    /// # Errors
    ///
    /// - [`RolloutError::Unauthorized`] if `presented` does not match `expected`
    /// - [`RolloutError::BadRequest`] / [`RolloutError::InvalidVersion`] for bad identifiers
    /// - I/O and archive errors from staging; the store is left as it was
    pub async fn publish(
        &self,
        expected: &Credentials,
        presented: &Credentials,
        bundle: ReleaseBundle,
    ) -> Result<PublishOutcome> {
        authorize(expected, presented)?;

        let program_dir = self.registry.program_dir(&bundle.program)?;
        let version = parse_version_param(&bundle.version)?;
        let installer_name = sanitize_file_name(&bundle.installer.file_name)?;
        if installer_name == MANIFEST_FILE
            || installer_name == CHANGELOG_FILE
            || installer_name == SOURCE_DIR
        {
            return Err(RolloutError::bad_request(format!(
                "installer file name '{installer_name}' is reserved"
            )));
        }

        let _guard = self.lock_key(&bundle.program, &version).await;

        info!("Publishing {} {}", bundle.program, version);
        ensure_dir(&program_dir)?;
        let staging = StagingDir::new_in(&program_dir, &version.to_string())?;

        let files = match self.assemble(staging.path(), &bundle, &installer_name).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Publishing {} {} failed: {}", bundle.program, version, e);
                drop(staging);
                self.cleanup_empty_program(&bundle.program, &program_dir).await;
                return Err(e);
            }
        };

        // From here on the blocking task owns the staging directory.
        let final_dir = program_dir.join(version.to_string());
        let staged = staging.keep();
        let replaced = run_blocking(move || {
            let promoted = promote(&staged, &final_dir);
            if promoted.is_err()
                && staged.exists()
                && let Err(e) = remove_dir_all(&staged)
            {
                warn!("Failed to clean up staging directory {}: {}", staged.display(), e);
            }
            promoted
        })
        .await;
        let replaced = match replaced {
            Ok(replaced) => replaced,
            Err(e) => {
                self.cleanup_empty_program(&bundle.program, &program_dir).await;
                return Err(e);
            }
        };

        info!(
            "Published {} {} ({} files{})",
            bundle.program,
            version,
            files,
            if replaced { ", replaced existing record" } else { "" }
        );
        Ok(PublishOutcome {
            program: bundle.program,
            version,
            files,
            replaced,
        })
    }

    /// Deletes one published version.
    ///
    /// Removes the program directory too when no published version remains.
    pub async fn delete_version(
        &self,
        expected: &Credentials,
        presented: &Credentials,
        program: &str,
        version: &str,
    ) -> Result<()> {
        authorize(expected, presented)?;
        let program_dir = self.registry.program_dir(program)?;
        let version = parse_version_param(version)?;

        let _guard = self.lock_key(program, &version).await;

        let record = program_dir.join(version.to_string());
        if !record.is_dir() {
            return Err(RolloutError::VersionNotFound {
                program: program.to_string(),
                version: version.to_string(),
            });
        }

        run_blocking(move || remove_dir_all(&record)).await?;
        info!("Deleted {} {}", program, version);

        self.cleanup_empty_program(program, &program_dir).await;
        Ok(())
    }

    /// Deletes a program with all of its versions.
    pub async fn delete_program(
        &self,
        expected: &Credentials,
        presented: &Credentials,
        program: &str,
    ) -> Result<()> {
        authorize(expected, presented)?;
        let program_dir = self.registry.program_dir(program)?;
        if !program_dir.is_dir() {
            return Err(RolloutError::ProgramNotFound {
                program: program.to_string(),
            });
        }

        run_blocking(move || remove_dir_all(&program_dir)).await?;
        info!("Deleted program {}", program);
        Ok(())
    }

    async fn lock_key(&self, program: &str, version: &Version) -> KeyGuard<'_> {
        let key = format!("{program}/{version}");
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyGuard {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }

    /// Fills the staging directory and returns the number of manifest entries.
    async fn assemble(
        &self,
        staging: &Path,
        bundle: &ReleaseBundle,
        installer_name: &str,
    ) -> Result<usize> {
        let source_dir = staging.join(SOURCE_DIR);
        let archive = bundle.source_archive.clone();
        let extract_to = source_dir.clone();
        let extracted = run_blocking(move || extract_zip(&archive, &extract_to)).await?;
        debug!("Extracted {} files into {}", extracted, source_dir.display());

        let installer_target = staging.join(installer_name);
        tokio::fs::copy(&bundle.installer.path, &installer_target)
            .await
            .map_err(|e| RolloutError::io("store installer", &bundle.installer.path, &e))?;

        let changelog_target = staging.join(CHANGELOG_FILE);
        match &bundle.changelog {
            Some(changelog) => {
                tokio::fs::copy(changelog, &changelog_target)
                    .await
                    .map_err(|e| RolloutError::io("store changelog", changelog, &e))?;
            }
            None => {
                tokio::fs::write(&changelog_target, b"")
                    .await
                    .map_err(|e| RolloutError::io("store changelog", &changelog_target, &e))?;
            }
        }

        let manifest = build_manifest(&source_dir, self.hash_concurrency).await?.into_complete()?;
        let manifest_path = staging.join(MANIFEST_FILE);
        let files = manifest.len();
        run_blocking(move || manifest.save(&manifest_path)).await?;
        Ok(files)
    }

    /// Removes the program directory if it holds nothing at all.
    async fn cleanup_empty_program(&self, program: &str, program_dir: &Path) {
        let has_versions =
            self.registry.list_versions(program).await.map(|v| !v.is_empty()).unwrap_or(true);
        if !has_versions && is_empty_dir(program_dir) {
            match tokio::fs::remove_dir(program_dir).await {
                Ok(()) => debug!("Removed empty program directory {}", program_dir.display()),
                Err(e) => warn!(
                    "Failed to remove empty program directory {}: {}",
                    program_dir.display(),
                    e
                ),
            }
        }
    }
}

/// Exclusive access to one `program/version` key.
///
/// The key's entry is dropped from the lock map on release unless another
/// task is already waiting on it.
struct KeyGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn authorize(expected: &Credentials, presented: &Credentials) -> Result<()> {
    if expected.matches(&presented.login, &presented.password) {
        Ok(())
    } else {
        Err(RolloutError::Unauthorized)
    }
}

/// Moves `staged` to `final_dir`, superseding any existing record.
///
/// Returns whether a record was replaced. If the final rename fails, the
/// superseded record is restored.
fn promote(staged: &Path, final_dir: &Path) -> Result<bool> {
    let retired = if final_dir.exists() {
        let parent = final_dir.parent().unwrap_or(final_dir);
        let retired = parent.join(format!("{RETIRED_PREFIX}-{}", uuid::Uuid::new_v4()));
        std::fs::rename(final_dir, &retired)
            .map_err(|e| RolloutError::io("retire previous record", final_dir, &e))?;
        Some(retired)
    } else {
        None
    };

    if let Err(e) = std::fs::rename(staged, final_dir) {
        if let Some(retired) = &retired
            && let Err(restore) = std::fs::rename(retired, final_dir)
        {
            warn!("Failed to restore previous record {}: {}", final_dir.display(), restore);
        }
        return Err(RolloutError::io("promote staging directory", final_dir, &e));
    }

    let replaced = retired.is_some();
    if let Some(retired) = retired
        && let Err(e) = remove_dir_all(&retired)
    {
        warn!("Failed to remove superseded record {}: {}", retired.display(), e);
    }
    Ok(replaced)
}
