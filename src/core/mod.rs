//! Core types shared by every part of rollout.
//!
//! The core module holds the error taxonomy used across the server, the
//! client and the CLI:
//! - [`RolloutError`] - enumerated failure modes of publishing, reading and updating
//! - [`ErrorKind`] - the category of a failure (unauthorized, not found, ...)
//! - [`ErrorContext`] - user-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - convert any error to the user-friendly format
//!
//! Library functions return `Result<T, RolloutError>` so callers can branch on
//! [`RolloutError::kind`]; CLI glue code wraps them in `anyhow` and converts
//! back with [`user_friendly_error`] right before printing.

pub mod error;

pub use error::{ErrorContext, ErrorKind, RolloutError, user_friendly_error};

/// Result alias used by library operations.
pub type Result<T, E = RolloutError> = std::result::Result<T, E>;
