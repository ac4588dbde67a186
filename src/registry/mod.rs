//! Version Registry: the read side of the program store.
//!
//! The store is a plain directory tree:
//!
//! ```text
//! <root>/
//! └── <program>/
//!     ├── 1.0.0.0/
//!     │   ├── src/**            extracted source tree
//!     │   ├── setup.exe         installer artifact
//!     │   ├── changelog.txt
//!     │   └── FilesHash.json    manifest
//!     ├── 1.0.0.1/
//!     └── .staging-…            in-flight publish, never reported
//! ```
//!
//! A child directory is a published version exactly when its name is the
//! canonical form of a [`Version`]. Publishing only ever creates that name by
//! renaming a fully assembled staging directory, so every read here sees
//! either a complete record or nothing. Reads never mutate the store.

use crate::constants::{CHANGELOG_FILE, MANIFEST_FILE, SOURCE_DIR};
use crate::core::{Result, RolloutError};
use crate::manifest::{Manifest, build_manifest};
use crate::utils::path_validation::{manifest_path_to_relative, validate_program_name};
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Entry of the program listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSummary {
    /// Program name (its directory name).
    pub name: String,
    /// Highest published version.
    pub latest_version: Version,
}

/// Entry of a program's version listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    /// The version.
    pub version: Version,
    /// Contents of `changelog.txt`, empty when absent.
    pub changelog_text: String,
    /// File name of the installer artifact, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer: Option<String>,
    /// When the record was promoted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Outcome of [`Registry::rebuild_all_manifests`].
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// `(program, version)` pairs whose manifest was rewritten.
    pub rebuilt: Vec<(String, Version)>,
    /// `(program, version, error)` for records that could not be rebuilt.
    pub failed: Vec<(String, Version, RolloutError)>,
}

/// Read access to the program store rooted at a directory.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    /// Create a registry over `root`. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// The store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `program`, after validating the name.
    pub fn program_dir(&self, program: &str) -> Result<PathBuf> {
        validate_program_name(program)?;
        Ok(self.root.join(program))
    }

    /// Directory of a VersionRecord, after validating the program name.
    pub fn version_dir(&self, program: &str, version: &Version) -> Result<PathBuf> {
        Ok(self.program_dir(program)?.join(version.to_string()))
    }

    /// Lists every program that has at least one published version.
    ///
    /// Programs without versions (for example a directory left behind by an
    /// external tool) are skipped rather than failing the listing. A missing
    /// store root yields an empty list.
    pub async fn list_programs(&self) -> Result<Vec<ProgramSummary>> {
        if !is_dir(&self.root).await {
            debug!("Program store {} does not exist yet", self.root.display());
            return Ok(Vec::new());
        }
        let names = read_child_dirs(&self.root).await?;

        let mut programs = Vec::new();
        for name in names {
            if validate_program_name(&name).is_err() {
                continue;
            }
            let versions = self.scan_versions(&self.root.join(&name)).await?;
            match Version::latest(&versions) {
                Some(latest_version) => programs.push(ProgramSummary {
                    name,
                    latest_version,
                }),
                None => debug!("Skipping program '{}' with no published versions", name),
            }
        }

        programs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(programs)
    }

    /// Published versions of `program`, ascending.
    ///
    /// # Errors
    ///
    /// [`RolloutError::ProgramNotFound`] if the program directory does not exist.
    pub async fn list_versions(&self, program: &str) -> Result<Vec<Version>> {
        let program_dir = self.existing_program_dir(program).await?;
        self.scan_versions(&program_dir).await
    }

    /// Published versions of `program` with changelog and installer details, ascending.
    pub async fn version_summaries(&self, program: &str) -> Result<Vec<VersionSummary>> {
        let program_dir = self.existing_program_dir(program).await?;
        let versions = self.scan_versions(&program_dir).await?;

        let mut summaries = Vec::with_capacity(versions.len());
        for version in versions {
            let record = program_dir.join(version.to_string());
            let changelog_text = match tokio::fs::read(record.join(CHANGELOG_FILE)).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => {
                    return Err(RolloutError::io("read changelog", &record.join(CHANGELOG_FILE), &e));
                }
            };
            let installer = find_installer(&record)
                .await?
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
            let published_at = tokio::fs::metadata(&record)
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);

            summaries.push(VersionSummary {
                version,
                changelog_text,
                installer,
                published_at,
            });
        }
        Ok(summaries)
    }

    /// The highest published version of `program`.
    ///
    /// # Errors
    ///
    /// [`RolloutError::ProgramNotFound`] if the program does not exist,
    /// [`RolloutError::NoVersions`] if it has no published versions.
    pub async fn latest_version(&self, program: &str) -> Result<Version> {
        let versions = self.list_versions(program).await?;
        Version::latest(&versions).ok_or_else(|| RolloutError::NoVersions {
            program: program.to_string(),
        })
    }

    /// The stored manifest of a published version.
    ///
    /// The manifest is read from `FilesHash.json`; it is never recomputed on read.
    pub async fn get_manifest(&self, program: &str, version: &Version) -> Result<Manifest> {
        let record = self.existing_version_dir(program, version).await?;
        let path = record.join(MANIFEST_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RolloutError::VersionNotFound {
                    program: program.to_string(),
                    version: version.to_string(),
                });
            }
            Err(e) => return Err(RolloutError::io("read manifest", &path, &e)),
        };
        Manifest::from_json(&content)
    }

    /// Absolute path of a file inside a version's source tree.
    ///
    /// `relative_path` is in manifest form (`/bin/app.dll` or `\bin\app.dll`).
    ///
    /// # Errors
    ///
    /// [`RolloutError::BadRequest`] for unsafe paths, [`RolloutError::FileNotFound`]
    /// if the file is not part of the version.
    pub async fn file_path(
        &self,
        program: &str,
        version: &Version,
        relative_path: &str,
    ) -> Result<PathBuf> {
        let relative = manifest_path_to_relative(relative_path)?;
        let record = self.existing_version_dir(program, version).await?;
        let path = record.join(SOURCE_DIR).join(relative);

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            _ => Err(RolloutError::FileNotFound {
                program: program.to_string(),
                version: version.to_string(),
                path: relative_path.to_string(),
            }),
        }
    }

    /// Absolute path of a version's installer artifact.
    pub async fn installer_path(&self, program: &str, version: &Version) -> Result<PathBuf> {
        let record = self.existing_version_dir(program, version).await?;
        find_installer(&record).await?.ok_or_else(|| RolloutError::FileNotFound {
            program: program.to_string(),
            version: version.to_string(),
            path: "installer".to_string(),
        })
    }

    /// Recomputes and atomically rewrites the manifest of one version.
    pub async fn rebuild_manifest(
        &self,
        program: &str,
        version: &Version,
        concurrency: usize,
    ) -> Result<Manifest> {
        let record = self.existing_version_dir(program, version).await?;
        let build = build_manifest(&record.join(SOURCE_DIR), concurrency).await?;
        let manifest = build.into_complete()?;

        let target = record.join(MANIFEST_FILE);
        let to_save = manifest.clone();
        tokio::task::spawn_blocking(move || to_save.save(&target)).await.map_err(|e| {
            RolloutError::Other {
                message: format!("Task join error while saving manifest: {e}"),
            }
        })??;

        info!("Rebuilt manifest for {} {} ({} files)", program, version, manifest.len());
        Ok(manifest)
    }

    /// Rebuilds the manifest of every published version of every program.
    ///
    /// Failures are collected per record; one bad record does not stop the rest.
    pub async fn rebuild_all_manifests(&self, concurrency: usize) -> Result<RebuildReport> {
        let mut report = RebuildReport::default();
        for program in self.list_programs().await? {
            for version in self.list_versions(&program.name).await? {
                match self.rebuild_manifest(&program.name, &version, concurrency).await {
                    Ok(_) => report.rebuilt.push((program.name.clone(), version)),
                    Err(e) => {
                        warn!("Failed to rebuild manifest for {} {}: {}", program.name, version, e);
                        report.failed.push((program.name.clone(), version, e));
                    }
                }
            }
        }
        Ok(report)
    }

    async fn existing_program_dir(&self, program: &str) -> Result<PathBuf> {
        let dir = self.program_dir(program)?;
        if is_dir(&dir).await {
            Ok(dir)
        } else {
            Err(RolloutError::ProgramNotFound {
                program: program.to_string(),
            })
        }
    }

    async fn existing_version_dir(&self, program: &str, version: &Version) -> Result<PathBuf> {
        let program_dir = self.existing_program_dir(program).await?;
        let dir = program_dir.join(version.to_string());
        if is_dir(&dir).await {
            Ok(dir)
        } else {
            Err(RolloutError::VersionNotFound {
                program: program.to_string(),
                version: version.to_string(),
            })
        }
    }

    async fn scan_versions(&self, program_dir: &Path) -> Result<Vec<Version>> {
        let mut versions: Vec<Version> = read_child_dirs(program_dir)
            .await?
            .iter()
            .filter_map(|name| Version::from_dir_name(name))
            .collect();
        versions.sort();
        Ok(versions)
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Names of the child directories of `dir`.
async fn read_child_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut entries =
        tokio::fs::read_dir(dir).await.map_err(|e| RolloutError::io("read directory", dir, &e))?;

    let mut names = Vec::new();
    while let Some(entry) =
        entries.next_entry().await.map_err(|e| RolloutError::io("read directory", dir, &e))?
    {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Finds the installer of a VersionRecord.
///
/// The installer is the regular file in the record directory that is neither
/// the manifest nor the changelog. If several candidates exist, `.exe` and
/// `.msi` files win, then the alphabetically first name.
pub(crate) async fn find_installer(record: &Path) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(record)
        .await
        .map_err(|e| RolloutError::io("read directory", record, &e))?;

    let mut candidates = Vec::new();
    while let Some(entry) =
        entries.next_entry().await.map_err(|e| RolloutError::io("read directory", record, &e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && name != MANIFEST_FILE && name != CHANGELOG_FILE {
            candidates.push(entry.path());
        }
    }

    candidates.sort_by_key(|path| {
        let extension =
            path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
        (!matches!(extension.as_str(), "exe" | "msi"), path.clone())
    });
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{FileEntry, hash_bytes};
    use std::fs;
    use tempfile::TempDir;

    fn write_record(root: &Path, program: &str, version: &str, files: &[(&str, &str)]) {
        let record = root.join(program).join(version);
        let src = record.join(SOURCE_DIR);
        fs::create_dir_all(&src).unwrap();
        let mut entries = Vec::new();
        for (path, content) in files {
            let target = src.join(path);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(&target, content).unwrap();
            entries.push(FileEntry::new(format!("/{path}"), hash_bytes(content.as_bytes())));
        }
        fs::write(record.join("setup.exe"), "installer").unwrap();
        fs::write(record.join(CHANGELOG_FILE), format!("Changes in {version}")).unwrap();
        Manifest::from_entries(entries).save(&record.join(MANIFEST_FILE)).unwrap();
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_latest_version_is_maximum() {
        let temp = TempDir::new().unwrap();
        for version in ["1.0.0.0", "1.0.0.1", "1.0.0.10", "0.9.9.9"] {
            write_record(temp.path(), "Editor", version, &[("app.dll", version)]);
        }
        // Not versions: staging and junk
        fs::create_dir_all(temp.path().join("Editor/.staging-1.0.0.2-x")).unwrap();
        fs::create_dir_all(temp.path().join("Editor/Download")).unwrap();

        let registry = Registry::new(temp.path());

        assert_eq!(registry.latest_version("Editor").await.unwrap(), v("1.0.0.10"));
        assert_eq!(
            registry.list_versions("Editor").await.unwrap(),
            vec![v("0.9.9.9"), v("1.0.0.0"), v("1.0.0.1"), v("1.0.0.10")]
        );
    }

    #[tokio::test]
    async fn test_latest_version_errors() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("Empty")).unwrap();
        let registry = Registry::new(temp.path());

        assert!(matches!(
            registry.latest_version("Missing").await,
            Err(RolloutError::ProgramNotFound { .. })
        ));
        assert!(matches!(
            registry.latest_version("Empty").await,
            Err(RolloutError::NoVersions { .. })
        ));
        assert!(matches!(
            registry.latest_version("").await,
            Err(RolloutError::BadRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_programs_skips_empty() {
        let temp = TempDir::new().unwrap();
        write_record(temp.path(), "Viewer", "2.0.0.0", &[("v.dll", "v")]);
        write_record(temp.path(), "Editor", "1.0.0.0", &[("e.dll", "e")]);
        fs::create_dir_all(temp.path().join("Abandoned")).unwrap();

        let programs = Registry::new(temp.path()).list_programs().await.unwrap();

        assert_eq!(
            programs,
            vec![
                ProgramSummary {
                    name: "Editor".to_string(),
                    latest_version: v("1.0.0.0"),
                },
                ProgramSummary {
                    name: "Viewer".to_string(),
                    latest_version: v("2.0.0.0"),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_programs_missing_root() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::new(temp.path().join("programs"));
        assert!(registry.list_programs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_version_summaries() {
        let temp = TempDir::new().unwrap();
        write_record(temp.path(), "Editor", "1.0.0.0", &[("a", "a")]);
        write_record(temp.path(), "Editor", "1.0.0.1", &[("a", "b")]);
        fs::remove_file(temp.path().join("Editor/1.0.0.1").join(CHANGELOG_FILE)).unwrap();

        let summaries = Registry::new(temp.path()).version_summaries("Editor").await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].changelog_text, "Changes in 1.0.0.0");
        assert_eq!(summaries[0].installer.as_deref(), Some("setup.exe"));
        assert!(summaries[0].published_at.is_some());
        assert_eq!(summaries[1].changelog_text, "");
    }

    #[tokio::test]
    async fn test_get_manifest_and_file_path() {
        let temp = TempDir::new().unwrap();
        write_record(temp.path(), "Editor", "1.0.0.0", &[("bin/app.dll", "app")]);
        let registry = Registry::new(temp.path());

        let manifest = registry.get_manifest("Editor", &v("1.0.0.0")).await.unwrap();
        assert_eq!(manifest.hash_of("/bin/app.dll"), Some(hash_bytes(b"app").as_str()));

        let path = registry.file_path("Editor", &v("1.0.0.0"), "\\bin\\app.dll").await.unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "app");

        assert!(matches!(
            registry.get_manifest("Editor", &v("9.9.9.9")).await,
            Err(RolloutError::VersionNotFound { .. })
        ));
        assert!(matches!(
            registry.file_path("Editor", &v("1.0.0.0"), "/missing.dll").await,
            Err(RolloutError::FileNotFound { .. })
        ));
        assert!(matches!(
            registry.file_path("Editor", &v("1.0.0.0"), "/../../FilesHash.json").await,
            Err(RolloutError::BadRequest { .. })
        ));
        // Directories are not files
        assert!(matches!(
            registry.file_path("Editor", &v("1.0.0.0"), "/bin").await,
            Err(RolloutError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_installer_path() {
        let temp = TempDir::new().unwrap();
        write_record(temp.path(), "Editor", "1.0.0.0", &[("a", "a")]);
        fs::write(temp.path().join("Editor/1.0.0.0/notes.pdf"), "pdf").unwrap();

        let installer =
            Registry::new(temp.path()).installer_path("Editor", &v("1.0.0.0")).await.unwrap();
        assert_eq!(installer.file_name().unwrap(), "setup.exe");
    }

    #[tokio::test]
    async fn test_rebuild_manifest() {
        let temp = TempDir::new().unwrap();
        write_record(temp.path(), "Editor", "1.0.0.0", &[("a.dll", "a")]);
        let record = temp.path().join("Editor/1.0.0.0");
        fs::write(record.join(SOURCE_DIR).join("added.dll"), "new").unwrap();
        fs::write(record.join(MANIFEST_FILE), "[]").unwrap();

        let registry = Registry::new(temp.path());
        let report = registry.rebuild_all_manifests(2).await.unwrap();

        assert_eq!(report.rebuilt, vec![("Editor".to_string(), v("1.0.0.0"))]);
        assert!(report.failed.is_empty());
        let manifest = registry.get_manifest("Editor", &v("1.0.0.0")).await.unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.hash_of("/added.dll"), Some(hash_bytes(b"new").as_str()));
    }
}
