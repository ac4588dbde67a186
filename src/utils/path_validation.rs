//! Path validation for identifiers and relative paths that arrive over the wire.
//!
//! Program names, version strings, manifest paths and installer file names are
//! all joined onto local directories. Everything here rejects input that could
//! escape the directory it is joined onto.

use crate::core::{Result, RolloutError};
use crate::version::Version;
use std::path::{Component, Path, PathBuf};

/// Validates a program name.
///
/// A program name must be non-empty, a single path component, and must not
/// start with `.` (hidden names are reserved for staging directories).
///
/// # Errors
///
/// Returns [`RolloutError::BadRequest`] describing the problem.
///
/// # Examples
///
/// ```rust
/// use rollout::utils::path_validation::validate_program_name;
///
/// assert!(validate_program_name("Editor").is_ok());
/// assert!(validate_program_name("").is_err());
/// assert!(validate_program_name("../etc").is_err());
/// assert!(validate_program_name(".staging").is_err());
/// ```
pub fn validate_program_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RolloutError::bad_request("program name must not be empty"));
    }
    if name.starts_with('.') {
        return Err(RolloutError::bad_request(format!(
            "program name '{name}' must not start with '.'"
        )));
    }
    if name.contains(['/', '\\', ':', '\0']) {
        return Err(RolloutError::bad_request(format!(
            "program name '{name}' must be a single path component"
        )));
    }
    Ok(())
}

/// Parses a version coming from a request parameter.
///
/// An empty value is a [`RolloutError::BadRequest`]; anything else that is not
/// a four-component version is [`RolloutError::InvalidVersion`], which maps to
/// the same category.
pub fn parse_version_param(raw: &str) -> Result<Version> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RolloutError::bad_request("version must not be empty"));
    }
    raw.parse()
}

/// Converts a manifest-relative path into a relative [`PathBuf`].
///
/// Both `/` and `\` are accepted as separators and a single leading separator
/// is stripped, so `\bin\app.dll` and `/bin/app.dll` resolve identically.
///
/// # Errors
///
/// Rejects empty paths, `.` and `..` components, drive prefixes (`C:`) and
/// NUL bytes.
pub fn manifest_path_to_relative(raw: &str) -> Result<PathBuf> {
    if raw.contains('\0') {
        return Err(RolloutError::bad_request("path must not contain NUL bytes"));
    }

    let normalized = raw.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');

    let mut path = PathBuf::new();
    for part in trimmed.split('/') {
        match part {
            "" => {}
            "." | ".." => {
                return Err(RolloutError::bad_request(format!(
                    "path '{raw}' must not contain '.' or '..' components"
                )));
            }
            part if part.contains(':') => {
                return Err(RolloutError::bad_request(format!(
                    "path '{raw}' must not contain a drive prefix"
                )));
            }
            part => path.push(part),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(RolloutError::bad_request("path must not be empty"));
    }
    Ok(path)
}

/// Renders a path relative to a source subtree in manifest form.
///
/// The result has a single leading `/` and `/` separators on every platform.
///
/// ```rust
/// use rollout::utils::path_validation::to_manifest_path;
/// use std::path::Path;
///
/// assert_eq!(to_manifest_path(Path::new("bin/app.dll")), "/bin/app.dll");
/// ```
#[must_use]
pub fn to_manifest_path(relative: &Path) -> String {
    let mut out = String::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            out.push('/');
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

/// Reduces an uploaded file name to its final component.
///
/// Browsers and some clients send full local paths as the multipart file name;
/// only the last component is kept. Names that end up empty or reserved are
/// rejected.
pub fn sanitize_file_name(raw: &str) -> Result<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['\0', ':']) {
        return Err(RolloutError::bad_request(format!("invalid file name '{raw}'")));
    }
    Ok(name.to_string())
}
