//! Test environment setup and management

use crate::config::{ClientConfig, Credentials, ServerConfig};
use crate::manifest::hash_file;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Login used by test environments.
pub const TEST_LOGIN: &str = "admin";

/// Password used by test environments.
pub const TEST_PASSWORD: &str = "secret";

/// Isolated directories for one server/client test.
pub struct TestEnvironment {
    /// Owns everything below; removed on drop.
    pub temp_dir: TempDir,
    /// Program store root.
    pub store_dir: PathBuf,
    /// Client data directory (rollback history lives below it).
    pub data_dir: PathBuf,
    /// Live install path.
    pub install_dir: PathBuf,
    /// Scratch space for release bundles.
    pub uploads_dir: PathBuf,
}

impl TestEnvironment {
    /// Create a new test environment
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let store_dir = temp_dir.path().join("programs");
        let data_dir = temp_dir.path().join("appdata");
        let install_dir = temp_dir.path().join("install");
        let uploads_dir = temp_dir.path().join("uploads");

        fs::create_dir_all(&store_dir)?;
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&uploads_dir)?;

        Ok(Self {
            temp_dir,
            store_dir,
            data_dir,
            install_dir,
            uploads_dir,
        })
    }

    /// The credentials the test server is configured with.
    #[must_use]
    pub fn credentials() -> Credentials {
        Credentials::new(TEST_LOGIN, TEST_PASSWORD)
    }

    /// Server config over this environment's store.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            root: self.store_dir.clone(),
            login: TEST_LOGIN.to_string(),
            password: TEST_PASSWORD.to_string(),
            hash_concurrency: 2,
            ..ServerConfig::default()
        }
    }

    /// Client config pointing at `server_url` with this environment's data dir.
    #[must_use]
    pub fn client_config(&self, server_url: &str) -> ClientConfig {
        ClientConfig {
            server_url: server_url.to_string(),
            data_dir: Some(self.data_dir.clone()),
            max_parallel: 4,
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            ..ClientConfig::default()
        }
    }

    /// Rollback history directory of `program`.
    #[must_use]
    pub fn history_dir(&self, program: &str) -> PathBuf {
        self.data_dir.join(program).join(crate::constants::HISTORY_DIR)
    }

    /// Writes a file below the install path.
    pub fn write_installed(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let path = self.install_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Reads a file below the install path.
    pub fn read_installed(&self, relative: impl AsRef<Path>) -> Result<String> {
        let path = self.install_dir.join(relative);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Relative path → content hash for every file under `root`.
    pub fn snapshot(root: &Path) -> Result<BTreeMap<String, String>> {
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let relative = entry.path().strip_prefix(root)?;
                let key = relative.to_string_lossy().replace('\\', "/");
                files.insert(key, hash_file(entry.path())?);
            }
        }
        Ok(files)
    }
}
