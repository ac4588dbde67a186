//! Spooling of `POST version` multipart uploads to temporary files.
//!
//! Uploads are written to the system temp directory, never into the program
//! store, so a rejected request leaves the store untouched. When the
//! credential fields arrive before the file fields (as the bundled client
//! sends them), bad credentials are rejected before any file is spooled.

use crate::config::Credentials;
use crate::core::{Result, RolloutError};
use crate::publish::{ReleaseBundle, UploadedFile};
use axum::extract::Multipart;
use axum::extract::multipart::Field;
use std::path::Path;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

/// Multipart field names of a publish request.
pub mod fields {
    /// Publisher login.
    pub const LOGIN: &str = "login";
    /// Publisher password.
    pub const PASSWORD: &str = "password";
    /// Program name.
    pub const PROGRAM: &str = "program";
    /// Version string.
    pub const VERSION: &str = "version";
    /// ZIP archive of the program files.
    pub const SOURCE_ARCHIVE: &str = "sourceArchive";
    /// Installer artifact.
    pub const INSTALLER_FILE: &str = "installerFile";
    /// Changelog text.
    pub const CHANGELOG_FILE: &str = "changelogFile";
}

/// A parsed publish request whose files live in a temporary directory.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct SpooledUpload {
    _dir: TempDir,
    /// Presented credentials.
    pub presented: Credentials,
    /// The bundle, pointing into the temporary directory.
    pub bundle: ReleaseBundle,
}

/// Reads a publish request, spooling file fields to disk.
pub async fn spool_publish_request(
    mut multipart: Multipart,
    expected: &Credentials,
) -> Result<SpooledUpload> {
    let dir = tempfile::Builder::new()
        .prefix("rollout-upload-")
        .tempdir()
        .map_err(|e| RolloutError::io("create upload directory", &std::env::temp_dir(), &e))?;

    let mut login: Option<String> = None;
    let mut password: Option<String> = None;
    let mut program = String::new();
    let mut version = String::new();
    let mut source_archive = None;
    let mut installer = None;
    let mut changelog = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            fields::LOGIN => login = Some(field.text().await?),
            fields::PASSWORD => password = Some(field.text().await?),
            fields::PROGRAM => program = field.text().await?,
            fields::VERSION => version = field.text().await?,
            fields::SOURCE_ARCHIVE | fields::INSTALLER_FILE | fields::CHANGELOG_FILE => {
                if let (Some(login), Some(password)) = (&login, &password)
                    && !expected.matches(login, password)
                {
                    return Err(RolloutError::Unauthorized);
                }

                let file_name = field.file_name().unwrap_or(&name).to_string();
                let target = dir.path().join(&name);
                spool_field(field, &target).await?;
                let uploaded = UploadedFile {
                    file_name,
                    path: target,
                };
                match name.as_str() {
                    fields::SOURCE_ARCHIVE => source_archive = Some(uploaded.path),
                    fields::INSTALLER_FILE => installer = Some(uploaded),
                    _ => changelog = Some(uploaded.path),
                }
            }
            other => {
                tracing::debug!("Ignoring unknown multipart field '{}'", other);
            }
        }
    }

    let presented = Credentials::new(login.unwrap_or_default(), password.unwrap_or_default());
    if !expected.matches(&presented.login, &presented.password) {
        return Err(RolloutError::Unauthorized);
    }

    let source_archive = source_archive.ok_or_else(|| {
        RolloutError::bad_request(format!("missing '{}' field", fields::SOURCE_ARCHIVE))
    })?;
    let installer = installer.ok_or_else(|| {
        RolloutError::bad_request(format!("missing '{}' field", fields::INSTALLER_FILE))
    })?;

    Ok(SpooledUpload {
        _dir: dir,
        presented,
        bundle: ReleaseBundle {
            program,
            version,
            source_archive,
            installer,
            changelog,
        },
    })
}

async fn spool_field(mut field: Field<'_>, target: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(|e| RolloutError::io("create upload file", target, &e))?;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await.map_err(|e| RolloutError::io("write upload", target, &e))?;
    }
    file.flush().await.map_err(|e| RolloutError::io("flush upload", target, &e))?;
    Ok(())
}
