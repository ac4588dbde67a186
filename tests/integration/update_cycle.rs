//! End-to-end update cycles against a live server.

use crate::common::{TestServer, updater, v};
use rollout::manifest::hash_bytes;
use rollout::test_utils::{RecordingSink, ReleaseFixture, TestEnvironment};
use rollout::updater::rollback::rollback;
use rollout::updater::{
    CycleOutcome, NoProgress, RollbackHistory, SyncEngine, check_for_update,
};

/// Publishes `P` 1.0.0.0 and 1.0.0.1 and lays 1.0.0.0 out in the install dir.
async fn two_releases(env: &TestEnvironment, server: &TestServer) {
    server
        .publish(
            env,
            &ReleaseFixture::new("P", "1.0.0.0")
                .with_file("app.dll", "abc123")
                .with_file("lib/core.dll", "core v1")
                .with_file("obsolete.txt", "remove me"),
        )
        .await
        .unwrap();
    server
        .publish(
            env,
            &ReleaseFixture::new("P", "1.0.0.1")
                .with_file("app.dll", "abc123")
                .with_file("lib/core.dll", "core v2")
                .with_file("lib/extra.dll", "new in v2"),
        )
        .await
        .unwrap();

    env.write_installed("app.dll", "abc123").unwrap();
    env.write_installed("lib/core.dll", "core v1").unwrap();
    env.write_installed("obsolete.txt", "remove me").unwrap();
}

#[tokio::test]
async fn test_check_reports_newer_version() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    two_releases(&env, &server).await;
    let client = server.client(&env).unwrap();

    let check = check_for_update(&client, "P", &v("1.0.0.0")).await;
    assert!(check.needed);
    assert_eq!(check.latest, Some(v("1.0.0.1")));

    let check = check_for_update(&client, "P", &v("1.0.0.1")).await;
    assert!(!check.needed);

    let check = check_for_update(&client, "P", &v("2.0.0.0")).await;
    assert!(!check.needed);
    assert_eq!(check.latest, Some(v("1.0.0.1")));
}

#[tokio::test]
async fn test_update_fetches_only_changed_files() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    two_releases(&env, &server).await;

    let mut updater = updater(&server, &env, "P", "1.0.0.0", 4).unwrap();
    let sink = RecordingSink::default();
    let outcome = updater.run_cycle(&sink).await.unwrap();

    let CycleOutcome::Updated(applied) = outcome else {
        panic!("expected an update, got {outcome:?}");
    };
    assert_eq!(applied.from, v("1.0.0.0"));
    assert_eq!(applied.to, v("1.0.0.1"));
    assert!(applied.backed_up);
    assert_eq!(applied.report.reused, vec!["/app.dll".to_string()]);
    let mut fetched = applied.report.fetched.clone();
    fetched.sort();
    assert_eq!(fetched, vec!["/lib/core.dll".to_string(), "/lib/extra.dll".to_string()]);
    assert_eq!(sink.outcomes().len(), 3);

    assert_eq!(updater.installed().version, v("1.0.0.1"));
    assert_eq!(env.read_installed("lib/core.dll").unwrap(), "core v2");
    assert_eq!(env.read_installed("lib/extra.dll").unwrap(), "new in v2");
    assert!(!env.install_dir.join("obsolete.txt").exists());

    let live = TestEnvironment::snapshot(&env.install_dir).unwrap();
    let published =
        TestEnvironment::snapshot(&env.store_dir.join("P").join("1.0.0.1").join("src")).unwrap();
    assert_eq!(live, published);
    assert_eq!(live.get("app.dll").map(String::as_str), Some(hash_bytes(b"abc123").as_str()));

    let history = RollbackHistory::new(env.history_dir("P"));
    assert_eq!(history.versions().await.unwrap(), vec![v("1.0.0.0"), v("1.0.0.1")]);
}

#[tokio::test]
async fn test_second_cycle_is_up_to_date() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    two_releases(&env, &server).await;

    let mut updater = updater(&server, &env, "P", "1.0.0.0", 4).unwrap();
    updater.run_cycle(&NoProgress).await.unwrap();
    let before = TestEnvironment::snapshot(&env.install_dir).unwrap();

    let outcome = updater.run_cycle(&NoProgress).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::UpToDate { latest } if latest == v("1.0.0.1")));
    assert_eq!(TestEnvironment::snapshot(&env.install_dir).unwrap(), before);
}

#[tokio::test]
async fn test_resync_of_current_install_reuses_everything() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    two_releases(&env, &server).await;

    let mut updater = updater(&server, &env, "P", "1.0.0.0", 4).unwrap();
    updater.run_cycle(&NoProgress).await.unwrap();

    let client = server.client(&env).unwrap();
    let manifest = client.manifest("P", &v("1.0.0.1")).await.unwrap();
    let staging = tempfile::TempDir::new().unwrap();
    let report = SyncEngine::new(&client, 4)
        .sync("P", &v("1.0.0.1"), &manifest, &env.install_dir, staging.path(), &NoProgress)
        .await;

    assert!(report.is_complete());
    assert!(report.fetched.is_empty());
    assert_eq!(report.reused.len(), manifest.len());
}

#[tokio::test]
async fn test_fresh_install_downloads_everything() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    two_releases(&env, &server).await;
    std::fs::remove_dir_all(&env.install_dir).unwrap();

    let mut updater = updater(&server, &env, "P", "0.0.0.0", 4).unwrap();
    let CycleOutcome::Updated(applied) = updater.run_cycle(&NoProgress).await.unwrap() else {
        panic!("expected an update");
    };
    assert!(!applied.backed_up);
    assert_eq!(applied.report.fetched.len(), 3);
    assert!(applied.report.reused.is_empty());
    assert_eq!(env.read_installed("app.dll").unwrap(), "abc123");
}

#[tokio::test]
async fn test_unreachable_server_leaves_install_alone() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    two_releases(&env, &server).await;
    let before = TestEnvironment::snapshot(&env.install_dir).unwrap();

    let mut updater = updater(&server, &env, "P", "1.0.0.0", 4).unwrap();
    server.stop().await.unwrap();

    let outcome = updater.run_cycle(&NoProgress).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Undetermined));
    assert_eq!(updater.installed().version, v("1.0.0.0"));
    assert_eq!(TestEnvironment::snapshot(&env.install_dir).unwrap(), before);
}

#[tokio::test]
async fn test_rollback_restores_previous_version() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    two_releases(&env, &server).await;
    let original = TestEnvironment::snapshot(&env.install_dir).unwrap();

    let mut updater = updater(&server, &env, "P", "1.0.0.0", 4).unwrap();
    updater.run_cycle(&NoProgress).await.unwrap();
    assert_ne!(TestEnvironment::snapshot(&env.install_dir).unwrap(), original);

    let history = RollbackHistory::new(env.history_dir("P"));
    let restored = rollback(&history, "P", &v("1.0.0.0"), &env.install_dir).await.unwrap();
    assert_eq!(restored, 3);
    assert_eq!(TestEnvironment::snapshot(&env.install_dir).unwrap(), original);
}
