//! Global constants used throughout the rollout codebase.
//!
//! This module contains timeout durations, retention limits, reserved file
//! names and parallelism parameters that are shared between the server and
//! the client updater. Defining them centrally keeps the on-disk layout and
//! the wire contract in one place.

use std::time::Duration;

/// Name of the directory holding the extracted source tree of a version.
pub const SOURCE_DIR: &str = "src";

/// Name of the persisted manifest inside a VersionRecord.
pub const MANIFEST_FILE: &str = "FilesHash.json";

/// Name of the changelog blob inside a VersionRecord.
pub const CHANGELOG_FILE: &str = "changelog.txt";

/// Name of the client directory holding rollback copies (`<appdata>/<program>/Versions`).
pub const HISTORY_DIR: &str = "Versions";

/// Prefix for private staging directories.
///
/// Staging directories never parse as a [`Version`](crate::version::Version)
/// and start with a dot, so registry enumeration never reports them.
pub const STAGING_PREFIX: &str = ".staging";

/// Prefix for a superseded VersionRecord that is being removed after a re-publish.
pub const RETIRED_PREFIX: &str = ".retired";

/// Default number of rollback copies kept by the client.
pub const DEFAULT_RETENTION: usize = 4;

/// Default address the server binds to.
pub const DEFAULT_BIND: &str = "127.0.0.1:5228";

/// Default base URL the client talks to.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5228/";

/// Default upload limit for `POST version` (4 GiB - 1, matching the historical limit).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 4_294_967_295;

/// Default timeout for a whole server request (5 minutes).
///
/// Publishing a large release bundle includes extraction and hashing, so this
/// is deliberately generous.
pub const DEFAULT_SERVER_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for a client HTTP request (30 seconds).
pub const DEFAULT_CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for establishing a client connection (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of attempts made for a single file download before it is reported as failed.
pub const DEFAULT_FETCH_ATTEMPTS: usize = 3;

/// Starting delay for download retry backoff (100ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 100;

/// Maximum backoff delay between download retries (2s).
pub const MAX_BACKOFF_DELAY_MS: u64 = 2_000;

/// Minimum number of parallel operations regardless of CPU count.
pub const MIN_PARALLELISM: usize = 4;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default parallelism for hashing and file sync: `max(MIN_PARALLELISM, cores * 2)`.
pub fn default_parallelism() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    (cores * PARALLELISM_CORE_MULTIPLIER).max(MIN_PARALLELISM)
}
