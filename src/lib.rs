//! rollout - incremental release distribution
//!
//! A program store server that publishes versioned releases together with a
//! per-file content hash manifest, and a client updater that keeps installs
//! current by downloading only the files whose hash changed.
//!
//! # Architecture Overview
//!
//! ```text
//! Publish Pipeline → Version Registry → (HTTP) → Update Negotiator
//!                                                → File Sync Engine
//!                                                → Rollout Applier
//! ```
//!
//! - A published version is a directory `programs/<program>/<version>/`
//!   holding `src/**`, one installer, `changelog.txt` and `FilesHash.json`
//! - Versions only appear under their final name once complete
//! - Clients stage a new version beside their rollback history, then swap it
//!   into the live install and keep a bounded number of older versions
//!
//! ## Key Features
//!
//! - **Incremental**: unchanged files are reused from the live install
//! - **Crash-safe publishing**: staging directories plus rename-based promotion
//! - **Resilient sync**: per-file failures never abort the rest of a pass
//! - **Rollback**: previous versions are retained locally and restorable
//!
//! # Core Modules
//!
//! ## Server side
//! - [`manifest`] - content hashing and manifest building
//! - [`registry`] - read side of the program store
//! - [`publish`] - publish pipeline and deletion
//! - [`server`] - HTTP surface
//!
//! ## Client side
//! - [`client`] - typed HTTP client
//! - [`updater`] - negotiator, sync engine, applier, history, triggers
//!
//! ## Shared
//! - [`cli`] - command-line interface
//! - [`config`] - server and client configuration
//! - [`constants`] - file names, defaults and timeouts
//! - [`core`] - error taxonomy
//! - [`utils`] - file system helpers, path validation, progress
//! - [`version`] - four-component version numbers
//!
//! # Example
//!
//! ```rust,no_run
//! use rollout::client::ServerClient;
//! use rollout::config::ClientConfig;
//! use rollout::updater::check_for_update;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ServerClient::new(&ClientConfig::default())?;
//! let installed = "1.0.0.0".parse()?;
//! let check = check_for_update(&client, "Editor", &installed).await;
//! if check.needed {
//!     println!("update to {:?} available", check.latest);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod core;
pub mod manifest;
pub mod publish;
pub mod registry;
pub mod server;
pub mod updater;
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
