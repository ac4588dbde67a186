//! Integration test suite for rollout
//!
//! Every test starts the HTTP server on an ephemeral port inside the test
//! process and talks to it through the real client or the `rollout` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! cargo nextest run --test integration
//! ```
//!
//! # Test Organization
//!
//! - **publish_read**: Publishing over HTTP and the read endpoints
//! - **update_cycle**: End-to-end check → sync → apply against a live server
//! - **retention**: Rollback history bounds across many updates
//! - **cli**: The `rollout` binary

mod common;

mod cli;
mod publish_read;
mod retention;
mod update_cycle;
