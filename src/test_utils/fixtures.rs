//! Release bundle fixtures.

use super::zip_archive;
use crate::publish::{ReleaseBundle, UploadedFile};
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Describes a release to publish in a test.
#[derive(Debug, Clone)]
pub struct ReleaseFixture {
    /// Program name.
    pub program: String,
    /// Version string, possibly invalid on purpose.
    pub version: String,
    /// `(path, content)` pairs placed in the source archive.
    pub files: Vec<(String, Vec<u8>)>,
    /// Installer file name.
    pub installer_name: String,
    /// Changelog text, `None` to omit the changelog.
    pub changelog: Option<String>,
}

impl ReleaseFixture {
    /// A release with no files, a `setup.exe` installer and a one-line changelog.
    pub fn new(program: &str, version: &str) -> Self {
        Self {
            program: program.to_string(),
            version: version.to_string(),
            files: Vec::new(),
            installer_name: "setup.exe".to_string(),
            changelog: Some(format!("Release {version}")),
        }
    }

    /// Add a file to the source archive.
    #[must_use]
    pub fn with_file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.files.push((path.to_string(), content.as_ref().to_vec()));
        self
    }

    /// Override the installer file name.
    #[must_use]
    pub fn with_installer_name(mut self, name: &str) -> Self {
        self.installer_name = name.to_string();
        self
    }

    /// Override or remove the changelog.
    #[must_use]
    pub fn with_changelog(mut self, changelog: Option<&str>) -> Self {
        self.changelog = changelog.map(str::to_string);
        self
    }

    /// Raw bytes of the source archive.
    pub fn archive_bytes(&self) -> Vec<u8> {
        let entries: Vec<(&str, &[u8])> =
            self.files.iter().map(|(path, content)| (path.as_str(), content.as_slice())).collect();
        zip_archive(&entries)
    }

    /// Writes archive, installer and changelog into a fresh subdirectory of
    /// `dir` and returns the matching bundle.
    pub fn write_to(&self, dir: &Path) -> Result<ReleaseBundle> {
        let upload_dir = dir.join(uuid::Uuid::new_v4().to_string());
        fs::create_dir_all(&upload_dir)?;

        let source_archive = upload_dir.join("source.zip");
        fs::write(&source_archive, self.archive_bytes())?;

        let installer_path = upload_dir.join("installer.bin");
        fs::write(&installer_path, format!("installer for {} {}", self.program, self.version))?;

        let changelog = match &self.changelog {
            Some(text) => {
                let path = upload_dir.join("changelog.upload");
                fs::write(&path, text)?;
                Some(path)
            }
            None => None,
        };

        Ok(ReleaseBundle {
            program: self.program.clone(),
            version: self.version.clone(),
            source_archive,
            installer: UploadedFile {
                file_name: self.installer_name.clone(),
                path: installer_path,
            },
            changelog,
        })
    }
}
