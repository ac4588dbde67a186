//! Tests for the `rollout` binary.
//!
//! Commands that talk to a server run on a blocking thread while the server
//! keeps serving on the test runtime.

use crate::common::{TestServer, v};
use assert_cmd::Command;
use predicates::prelude::*;
use rollout::test_utils::{ReleaseFixture, TestEnvironment};
use rollout::updater::RollbackHistory;

fn rollout(env: &TestEnvironment) -> Command {
    let mut cmd = Command::cargo_bin("rollout").unwrap();
    cmd.env("ROLLOUT_DATA_DIR", &env.data_dir)
        .env_remove("ROLLOUT_SERVER_URL")
        .env_remove("ROLLOUT_LOGIN")
        .env_remove("ROLLOUT_PASSWORD")
        .arg("--no-progress");
    cmd
}

async fn run(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert()).await.unwrap()
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("rollout")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("rollback"))
        .stdout(predicate::str::contains("rebuild-manifests"));
}

#[test]
fn test_invalid_version_argument_is_rejected() {
    let env = TestEnvironment::new().unwrap();
    rollout(&env)
        .args(["check", "Editor", "not-a-version", "--server", "http://127.0.0.1:9/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not-a-version"));
}

#[test]
fn test_check_against_unreachable_server_succeeds() {
    let env = TestEnvironment::new().unwrap();
    rollout(&env)
        .args(["check", "Editor", "1.0.0.0", "--server", "http://127.0.0.1:9/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Could not determine"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_and_list_through_cli() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let bundle = ReleaseFixture::new("Editor", "1.0.0.0")
        .with_file("app.dll", "v1")
        .with_changelog(Some("Initial release"))
        .write_to(&env.uploads_dir)
        .unwrap();

    let mut publish = rollout(&env);
    publish
        .args(["publish", "Editor", "1.0.0.0", "--server", &server.url])
        .arg("--archive")
        .arg(&bundle.source_archive)
        .arg("--installer")
        .arg(&bundle.installer.path)
        .args(["--login", "admin", "--password", "secret"]);
    run(publish).await.success();
    assert!(env.store_dir.join("Editor").join("1.0.0.0").join("src").join("app.dll").exists());

    let mut programs = rollout(&env);
    programs.args(["programs", "--server", &server.url]);
    run(programs).await.success().stdout(predicate::str::contains("Editor"));

    let mut check = rollout(&env);
    check.args(["check", "Editor", "0.9.0.0", "--json", "--server", &server.url]);
    run(check).await.success().stdout(predicate::str::contains("\"needed\": true"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_with_wrong_password_fails() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let bundle = ReleaseFixture::new("Editor", "1.0.0.0").write_to(&env.uploads_dir).unwrap();

    let mut publish = rollout(&env);
    publish
        .args(["publish", "Editor", "1.0.0.0", "--server", &server.url])
        .arg("--archive")
        .arg(&bundle.source_archive)
        .arg("--installer")
        .arg(&bundle.installer.path)
        .args(["--login", "admin", "--password", "wrong"]);
    run(publish).await.failure();
    assert!(!env.store_dir.join("Editor").join("1.0.0.0").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_once_then_rollback() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    server
        .publish(&env, &ReleaseFixture::new("Editor", "1.0.0.1").with_file("app.dll", "v2"))
        .await
        .unwrap();
    env.write_installed("app.dll", "v1").unwrap();

    let mut update = rollout(&env);
    update
        .args(["update", "Editor", "1.0.0.0"])
        .arg(&env.install_dir)
        .args(["--once", "--server", &server.url]);
    run(update).await.success().stdout(predicate::str::contains("1.0.0.1"));
    assert_eq!(env.read_installed("app.dll").unwrap(), "v2");

    let history = RollbackHistory::new(env.history_dir("Editor"));
    assert!(history.contains(&v("1.0.0.0")).await);

    let mut list = rollout(&env);
    list.args(["rollback", "Editor", "--list"]);
    run(list).await.success().stdout(predicate::str::contains("1.0.0.0"));

    let mut restore = rollout(&env);
    restore.args(["rollback", "Editor", "1.0.0.0"]).arg(&env.install_dir);
    run(restore).await.success();
    assert_eq!(env.read_installed("app.dll").unwrap(), "v1");
}

#[test]
fn test_rebuild_manifests_on_empty_store() {
    let env = TestEnvironment::new().unwrap();
    rollout(&env)
        .arg("rebuild-manifests")
        .arg("--root")
        .arg(&env.store_dir)
        .assert()
        .success();
}
