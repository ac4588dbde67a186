//! Publishing over HTTP and reading the store back through the client.

use crate::common::{TestServer, v};
use rollout::config::Credentials;
use rollout::core::ErrorKind;
use rollout::manifest::hash_bytes;
use rollout::test_utils::{ReleaseFixture, TestEnvironment};

#[tokio::test]
async fn test_publish_then_read_everything_back() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let client = server.client(&env).unwrap();

    let response = server
        .publish(
            &env,
            &ReleaseFixture::new("Editor", "1.2.0.0")
                .with_file("app.dll", "binary v1")
                .with_file("data/config.json", "{}")
                .with_changelog(Some("First public build\nMore notes")),
        )
        .await
        .unwrap();
    assert_eq!(response.program, "Editor");
    assert_eq!(response.version, v("1.2.0.0"));
    assert_eq!(response.files, 2);
    assert!(!response.replaced);

    let programs = client.programs().await.unwrap();
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0].name, "Editor");
    assert_eq!(programs[0].latest_version, v("1.2.0.0"));

    let versions = client.versions("Editor").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].changelog_text.starts_with("First public build"));
    assert_eq!(versions[0].installer.as_deref(), Some("setup.exe"));

    assert_eq!(client.latest_version("Editor").await.unwrap(), v("1.2.0.0"));

    let manifest = client.manifest("Editor", &v("1.2.0.0")).await.unwrap();
    assert_eq!(manifest.len(), 2);
    let expected_hash = hash_bytes(b"binary v1");
    assert_eq!(manifest.hash_of("/app.dll"), Some(expected_hash.as_str()));
    assert!(manifest.hash_of("/data/config.json").is_some());

    let dest = env.temp_dir.path().join("downloaded.dll");
    let bytes = client.download_file("Editor", &v("1.2.0.0"), "/app.dll", &dest).await.unwrap();
    assert_eq!(bytes, 9);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "binary v1");

    let installer_dir = env.temp_dir.path().join("installer");
    std::fs::create_dir_all(&installer_dir).unwrap();
    let installer =
        client.download_installer("Editor", &v("1.2.0.0"), &installer_dir).await.unwrap();
    assert_eq!(installer.file_name().unwrap(), "setup.exe");
    assert_eq!(std::fs::read_to_string(&installer).unwrap(), "installer for Editor 1.2.0.0");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_latest_version_follows_numeric_order() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let client = server.client(&env).unwrap();

    for version in ["1.0.0.9", "1.0.0.10", "1.0.0.2"] {
        server
            .publish(&env, &ReleaseFixture::new("Editor", version).with_file("a.txt", version))
            .await
            .unwrap();
    }

    assert_eq!(client.latest_version("Editor").await.unwrap(), v("1.0.0.10"));
    let versions: Vec<_> =
        client.versions("Editor").await.unwrap().into_iter().map(|s| s.version).collect();
    assert_eq!(versions, vec![v("1.0.0.2"), v("1.0.0.9"), v("1.0.0.10")]);
}

#[tokio::test]
async fn test_republish_replaces_record() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let client = server.client(&env).unwrap();

    server
        .publish(&env, &ReleaseFixture::new("Editor", "1.0.0.0").with_file("old.txt", "old"))
        .await
        .unwrap();
    let response = server
        .publish(&env, &ReleaseFixture::new("Editor", "1.0.0.0").with_file("new.txt", "new"))
        .await
        .unwrap();
    assert!(response.replaced);

    let manifest = client.manifest("Editor", &v("1.0.0.0")).await.unwrap();
    assert!(manifest.hash_of("/new.txt").is_some());
    assert!(manifest.hash_of("/old.txt").is_none());
}

#[tokio::test]
async fn test_publish_with_empty_version_creates_nothing() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();

    let err = server
        .publish(&env, &ReleaseFixture::new("P", "").with_file("a.txt", "a"))
        .await
        .unwrap_err();
    let err = err.downcast::<rollout::core::RolloutError>().unwrap();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let program_dir = env.store_dir.join("P");
    let leftovers = std::fs::read_dir(&program_dir).map(|dir| dir.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_delete_with_wrong_credentials_leaves_version() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let client = server.client(&env).unwrap();

    server
        .publish(&env, &ReleaseFixture::new("P", "1.0.0.0").with_file("a.txt", "a"))
        .await
        .unwrap();

    let err = client
        .delete_version(&Credentials::new("admin", "wrong"), "P", "1.0.0.0")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(env.store_dir.join("P").join("1.0.0.0").join("src").join("a.txt").exists());

    client.delete_version(&TestEnvironment::credentials(), "P", "1.0.0.0").await.unwrap();
    assert!(!env.store_dir.join("P").join("1.0.0.0").exists());

    let err = client.latest_version("P").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_program_removes_all_versions() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let client = server.client(&env).unwrap();

    for version in ["1.0.0.0", "1.0.0.1"] {
        server.publish(&env, &ReleaseFixture::new("P", version)).await.unwrap();
    }
    client.delete_program(&TestEnvironment::credentials(), "P").await.unwrap();

    assert!(!env.store_dir.join("P").exists());
    assert!(client.programs().await.unwrap().is_empty());

    let err = client.delete_program(&TestEnvironment::credentials(), "P").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let env = TestEnvironment::new().unwrap();
    let server = TestServer::start(&env).await.unwrap();
    let client = server.client(&env).unwrap();

    server
        .publish(&env, &ReleaseFixture::new("P", "1.0.0.0").with_file("a.txt", "a"))
        .await
        .unwrap();

    let dest = env.temp_dir.path().join("missing");
    let err = client.download_file("P", &v("1.0.0.0"), "/nope.txt", &dest).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
