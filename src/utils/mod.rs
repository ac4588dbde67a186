//! Filesystem, path and terminal helpers shared by the server and the client.
//!
//! # Modules
//!
//! - [`fs`] - Directory operations, atomic writes and staging directories
//! - [`path_validation`] - Validation of names and relative paths from requests
//! - [`progress`] - Progress bars and spinners for long-running operations

pub mod fs;
pub mod path_validation;
pub mod progress;

pub use fs::{StagingDir, atomic_write, copy_dir, ensure_dir, move_dir};
pub use progress::ProgressBar;
