//! Test utilities for rollout
//!
//! Helpers shared by unit tests and the integration test target (enabled for
//! the latter through the `test-utils` feature).
//!
//! # Test Isolation
//!
//! - Every [`TestEnvironment`] owns a fresh temporary directory holding a
//!   program store, a client data directory and an install path
//! - Release bundles are generated on disk by [`ReleaseFixture`]
//! - Nothing reads process-wide environment variables except logging
//!
//! # Example
//!
//! ```rust,no_run
//! use rollout::test_utils::{ReleaseFixture, TestEnvironment};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let env = TestEnvironment::new()?;
//! let bundle = ReleaseFixture::new("Editor", "1.0.0.0")
//!     .with_file("app.dll", "v1")
//!     .write_to(&env.uploads_dir)?;
//! # Ok(())
//! # }
//! ```

pub mod environment;
pub mod fixtures;
pub mod source;

pub use environment::TestEnvironment;
pub use fixtures::ReleaseFixture;
pub use source::{FakeSource, RecordingSink};

use std::io::{Cursor, Write};
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. `level` wins over `RUST_LOG`; with
/// neither set, tests run without a subscriber.
///
/// To enable logging in tests via environment variable:
/// ```bash
/// RUST_LOG=rollout=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Builds a ZIP archive in memory.
///
/// Entry names use `/` separators; intermediate directories are implied.
///
/// # Panics
///
/// Panics if the in-memory writer fails, which only happens on allocation failure.
#[must_use]
pub fn zip_archive<C: AsRef<[u8]>>(entries: &[(&str, C)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options).expect("start zip entry");
        zip.write_all(content.as_ref()).expect("write zip entry");
    }
    zip.finish().expect("finish zip archive").into_inner()
}
