//! Source archive extraction.

use crate::core::{Result, RolloutError};
use std::fs::File;
use std::path::{Component, Path};

/// Extracts a ZIP archive into `dest_dir`, returning the number of files written.
///
/// Every entry must resolve to a path inside `dest_dir`; an archive containing
/// an absolute path or a `..` component is rejected before anything is
/// written for that entry.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let file =
        File::open(archive_path).map_err(|e| RolloutError::io("open archive", archive_path, &e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    std::fs::create_dir_all(dest_dir)
        .map_err(|e| RolloutError::io("create directory", dest_dir, &e))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let entry_path = entry.enclosed_name().ok_or_else(|| RolloutError::Archive {
            reason: format!("entry '{}' escapes the extraction directory", entry.name()),
        })?;
        if entry_path.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(RolloutError::Archive {
                reason: format!("entry '{}' has an unsafe path", entry_path.display()),
            });
        }

        let output_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            std::fs::create_dir_all(&output_path)
                .map_err(|e| RolloutError::io("create directory", &output_path, &e))?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RolloutError::io("create directory", parent, &e))?;
        }
        let mut outfile = File::create(&output_path)
            .map_err(|e| RolloutError::io("create file", &output_path, &e))?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|e| RolloutError::io("extract file", &output_path, &e))?;
        written += 1;
    }

    Ok(written)
}
