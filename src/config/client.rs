use super::load_toml;
use crate::constants::{
    DEFAULT_CLIENT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_FETCH_ATTEMPTS,
    DEFAULT_RETENTION, DEFAULT_SERVER_URL, default_parallelism,
};
use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for the client updater commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the update server.
    pub server_url: String,
    /// Directory holding per-program rollback history. Defaults to the
    /// platform data directory (`%APPDATA%` on Windows).
    pub data_dir: Option<PathBuf>,
    /// Number of rollback copies to keep, at least 1.
    pub retention: usize,
    /// Maximum concurrent file fetch/reuse workers.
    pub max_parallel: usize,
    /// Timeout for a single HTTP request.
    pub request_timeout_secs: u64,
    /// Timeout for establishing a connection.
    pub connect_timeout_secs: u64,
    /// Attempts per file download before the file is reported as failed.
    pub fetch_retries: usize,
    /// When set, `rollout update` re-runs the cycle on this interval instead
    /// of waiting for a line on stdin.
    pub poll_interval_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            data_dir: None,
            retention: DEFAULT_RETENTION,
            max_parallel: default_parallelism(),
            request_timeout_secs: DEFAULT_CLIENT_REQUEST_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            fetch_retries: DEFAULT_FETCH_ATTEMPTS,
            poll_interval_secs: None,
        }
    }
}

impl ClientConfig {
    /// Loads the config from `path` (if given), then applies environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_toml(path).await?,
            None => Self::default(),
        };
        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `ROLLOUT_SERVER_URL` and `ROLLOUT_DATA_DIR`.
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ROLLOUT_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(dir) = lookup("ROLLOUT_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Rejects settings the updater cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.retention == 0 {
            bail!("retention must be at least 1");
        }
        if self.max_parallel == 0 {
            bail!("max_parallel must be at least 1");
        }
        if self.fetch_retries == 0 {
            bail!("fetch_retries must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// The resolved data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .ok_or_else(|| anyhow!("Could not determine the platform data directory")),
        }
    }

    /// Root of the rollback history for `program` (`<data_dir>/<program>`).
    pub fn program_data_dir(&self, program: &str) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(program))
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Poll interval, if the timer trigger is configured.
    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}
