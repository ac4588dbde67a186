//! Rollback history stays bounded across many updates.

use crate::common::{TestServer, updater, v};
use rollout::test_utils::{ReleaseFixture, TestEnvironment};
use rollout::updater::{CycleOutcome, NoProgress, RollbackHistory};

#[tokio::test]
async fn test_history_keeps_most_recent_versions() {
    const RETENTION: usize = 3;
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();

    server
        .publish(&env, &ReleaseFixture::new("P", "1.0.0.0").with_file("app.dll", "build 0"))
        .await
        .unwrap();
    env.write_installed("app.dll", "build 0").unwrap();
    let mut updater = updater(&server, &env, "P", "1.0.0.0", RETENTION).unwrap();

    // N + k updates, one publish each
    for build in 1..=6 {
        let version = format!("1.0.0.{build}");
        server
            .publish(
                &env,
                &ReleaseFixture::new("P", &version)
                    .with_file("app.dll", format!("build {build}"))
                    .with_file("shared.dll", "unchanged"),
            )
            .await
            .unwrap();
        let outcome = updater.run_cycle(&NoProgress).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Updated(_)), "build {build}");

        let history = RollbackHistory::new(env.history_dir("P"));
        assert!(history.versions().await.unwrap().len() <= RETENTION);
    }

    let history = RollbackHistory::new(env.history_dir("P"));
    assert_eq!(history.versions().await.unwrap(), vec![v("1.0.0.4"), v("1.0.0.5"), v("1.0.0.6")]);
    assert_eq!(env.read_installed("app.dll").unwrap(), "build 6");
}

#[tokio::test]
async fn test_retention_of_one_keeps_only_current() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();

    for build in 0..3 {
        server
            .publish(
                &env,
                &ReleaseFixture::new("P", &format!("2.0.0.{build}"))
                    .with_file("app.dll", format!("build {build}")),
            )
            .await
            .unwrap();
    }
    env.write_installed("app.dll", "build 0").unwrap();

    let mut updater = updater(&server, &env, "P", "2.0.0.0", 1).unwrap();
    updater.run_cycle(&NoProgress).await.unwrap();

    let history = RollbackHistory::new(env.history_dir("P"));
    assert_eq!(history.versions().await.unwrap(), vec![v("2.0.0.2")]);
}
