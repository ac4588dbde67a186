//! Error handling for rollout
//!
//! This module provides the error taxonomy shared by the server and the client
//! updater, plus user-friendly error reporting for the CLI. The error system is
//! designed around two core principles:
//! 1. **Strongly-typed errors** so the HTTP layer and the update loop can react
//!    to the category of a failure (see [`ErrorKind`])
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! Every [`RolloutError`] belongs to exactly one [`ErrorKind`]:
//! - **Unauthorized**: bad credentials on a mutating call
//! - **NotFound**: missing program, version or file
//! - **BadRequest**: malformed identifiers such as an empty program name
//! - **IoFailure**: disk or archive extraction errors
//! - **NetworkFailure**: client-side transport errors
//! - **PartialSync**: one or more files failed to fetch during a sync pass
//!
//! # Examples
//!
//! ```rust,no_run
//! use rollout::core::{ErrorKind, RolloutError, user_friendly_error};
//!
//! let error = RolloutError::ProgramNotFound {
//!     program: "Editor".to_string(),
//! };
//! assert_eq!(error.kind(), ErrorKind::NotFound);
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Category of a [`RolloutError`].
///
/// The server maps each kind onto an HTTP status code and the client uses it
/// to decide whether a failure is soft (retry on the next cycle) or fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials did not match the configured login/password pair.
    Unauthorized,
    /// A program, version or file does not exist.
    NotFound,
    /// A request carried malformed or empty identifiers.
    BadRequest,
    /// Local disk or archive failure.
    IoFailure,
    /// Transport failure talking to the server.
    NetworkFailure,
    /// A sync pass finished with at least one failed file.
    PartialSync,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::IoFailure => "IO_FAILURE",
            Self::NetworkFailure => "NETWORK_FAILURE",
            Self::PartialSync => "PARTIAL_SYNC",
        };
        f.write_str(name)
    }
}

/// The main error type for rollout operations.
///
/// Variants carry owned strings rather than source errors so the type stays
/// `Clone` and can be rendered both as an HTTP payload and as a CLI message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RolloutError {
    /// Login or password did not match.
    #[error("Invalid login or password")]
    Unauthorized,

    /// The program directory does not exist in the store.
    #[error("Program '{program}' not found")]
    ProgramNotFound {
        /// Requested program name.
        program: String,
    },

    /// The program exists but has no published versions.
    #[error("Program '{program}' has no published versions")]
    NoVersions {
        /// Requested program name.
        program: String,
    },

    /// The requested version is not published.
    #[error("Version {version} of program '{program}' not found")]
    VersionNotFound {
        /// Requested program name.
        program: String,
        /// Requested version string.
        version: String,
    },

    /// A file inside a published version does not exist.
    #[error("File '{path}' not found in {program} {version}")]
    FileNotFound {
        /// Requested program name.
        program: String,
        /// Requested version string.
        version: String,
        /// Manifest-relative path.
        path: String,
    },

    /// A request carried malformed identifiers or missing fields.
    #[error("Bad request: {reason}")]
    BadRequest {
        /// What was wrong with the request.
        reason: String,
    },

    /// A string did not parse as a four-component version.
    #[error("Invalid version '{input}': expected major.minor.build.revision")]
    InvalidVersion {
        /// The rejected input.
        input: String,
    },

    /// A filesystem operation failed.
    #[error("File system error: {operation} ({path}): {reason}")]
    Io {
        /// The operation being attempted.
        operation: String,
        /// The path involved.
        path: String,
        /// Underlying error message.
        reason: String,
    },

    /// The uploaded source archive could not be read or extracted.
    #[error("Archive error: {reason}")]
    Archive {
        /// Underlying error message.
        reason: String,
    },

    /// A request to the update server failed.
    #[error("Network error: {operation}: {reason}")]
    Network {
        /// The request being attempted.
        operation: String,
        /// Underlying error message.
        reason: String,
    },

    /// Some files could not be fetched during a sync pass.
    #[error("{} of {total} files could not be fetched", .failed.len())]
    PartialSync {
        /// Manifest-relative paths of the failed files.
        failed: Vec<String>,
        /// Number of manifest entries processed.
        total: usize,
    },

    /// Anything that does not fit the categories above.
    #[error("{message}")]
    Other {
        /// Human readable message.
        message: String,
    },
}

impl RolloutError {
    /// Build an [`RolloutError::Io`] from an `std::io::Error`.
    pub fn io(operation: impl Into<String>, path: &Path, error: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.display().to_string(),
            reason: error.to_string(),
        }
    }

    /// Build a [`RolloutError::BadRequest`].
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    /// Build a [`RolloutError::Network`].
    pub fn network(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Network {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// The taxonomy category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::ProgramNotFound {
                ..
            }
            | Self::NoVersions {
                ..
            }
            | Self::VersionNotFound {
                ..
            }
            | Self::FileNotFound {
                ..
            } => ErrorKind::NotFound,
            Self::BadRequest {
                ..
            }
            | Self::InvalidVersion {
                ..
            } => ErrorKind::BadRequest,
            Self::Io {
                ..
            }
            | Self::Archive {
                ..
            }
            | Self::Other {
                ..
            } => ErrorKind::IoFailure,
            Self::Network {
                ..
            } => ErrorKind::NetworkFailure,
            Self::PartialSync {
                ..
            } => ErrorKind::PartialSync,
        }
    }

    /// Whether this error means the target does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

impl From<zip::result::ZipError> for RolloutError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Archive {
            reason: error.to_string(),
        }
    }
}

/// Error wrapper that adds a suggestion and details for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error.
    pub error: RolloutError,
    /// Optional suggestion for resolving the error.
    pub suggestion: Option<String>,
    /// Optional additional details.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without suggestion or details.
    #[must_use]
    pub const fn new(error: RolloutError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one applies.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(rollout_error) = error.downcast_ref::<RolloutError>() {
        return create_error_context(rollout_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(RolloutError::Io {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                    reason: io_error.to_string(),
                })
                .with_suggestion(
                    "Check ownership of the install path and the local data directory",
                );
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(RolloutError::Io {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                    reason: io_error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(RolloutError::Other {
            message: format!("Invalid configuration file: {toml_error}"),
        })
        .with_suggestion("Check the TOML syntax of the file passed with --config");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(RolloutError::Other {
        message,
    })
}

fn create_error_context(error: RolloutError) -> ErrorContext {
    match &error {
        RolloutError::Unauthorized => ErrorContext::new(error)
            .with_suggestion("Pass the login and password configured on the server")
            .with_details("Publishing and deleting require the server's configured credentials"),
        RolloutError::ProgramNotFound {
            ..
        }
        | RolloutError::NoVersions {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'rollout programs' to list the programs known to the server"),
        RolloutError::VersionNotFound {
            program,
            ..
        } => {
            let suggestion =
                format!("Run 'rollout versions {program}' to list the published versions");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        RolloutError::InvalidVersion {
            ..
        } => ErrorContext::new(error).with_suggestion("Use four numeric components, e.g. 1.0.0.1"),
        RolloutError::Network {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that the update server is running and reachable")
            .with_details("Use --server or ROLLOUT_SERVER_URL to point at a different server"),
        RolloutError::PartialSync {
            failed,
            ..
        } => {
            let details = format!("Failed files:\n  {}", failed.join("\n  "));
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("The live installation was left untouched; retry the update")
        }
        _ => ErrorContext::new(error),
    }
}
