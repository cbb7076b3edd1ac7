//! Tests for the `claude-slash` binary.

use crate::common::{TestEnv, mount_archive, mount_index, release_archive, snapshot};
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(env: &TestEnv, config: Option<PathBuf>, args: &[&str]) -> assert_cmd::assert::Assert {
    let home = env.home.clone();
    let project = env.project.clone();
    let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();

    tokio::task::spawn_blocking(move || {
        let mut cmd = Command::cargo_bin("claude-slash").unwrap();
        cmd.env("HOME", &home)
            .env("CLAUDE_SLASH_NO_PROGRESS", "1")
            .env("NO_COLOR", "1")
            .env_remove("CLAUDE_SLASH_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--project-dir")
            .arg(&project);
        if let Some(config) = config {
            cmd.arg("--config").arg(config);
        }
        cmd.args(&args).assert()
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_version_command() {
    let env = TestEnv::new().unwrap();
    run(&env, None, &["version"])
        .await
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_update_command_success() {
    let env = TestEnv::new().unwrap();
    env.install_local(&[("old.md", "old")]).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    mount_archive(&server, "v2.0.0", release_archive("v2.0.0", &[("save.md", "new")]).unwrap())
        .await;
    let config = env.write_config(&server).unwrap();

    run(&env, Some(config.clone()), &["update"])
        .await
        .success()
        .stdout(predicate::str::contains("to v2.0.0"))
        .stdout(predicate::str::contains("backed up to"));
    assert!(env.local_dir().join("save.md").exists());
    assert!(!env.local_dir().join("old.md").exists());

    run(&env, Some(config), &["update"])
        .await
        .success()
        .stdout(predicate::str::contains("Already up to date"));
}

#[tokio::test]
async fn test_update_command_reports_rollback() {
    let env = TestEnv::new().unwrap();
    env.install_local(&[("save.md", "v1")]).unwrap();
    let before = snapshot(&env.local_dir()).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    Mock::given(method("GET"))
        .and(path("/archive/v2.0.0.zip"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let config = env.write_config(&server).unwrap();

    run(&env, Some(config), &["update"])
        .await
        .code(1)
        .stderr(predicate::str::contains("Update to v2.0.0 failed during downloading").count(1))
        .stderr(predicate::str::contains("previous files restored").count(1))
        .stderr(predicate::str::contains("502"));

    assert_eq!(snapshot(&env.local_dir()).unwrap(), before);
}

#[tokio::test]
async fn test_update_without_installation_fails() {
    let env = TestEnv::new().unwrap();
    let server = MockServer::start().await;
    let config = env.write_config(&server).unwrap();

    run(&env, Some(config), &["update"])
        .await
        .code(1)
        .stderr(predicate::str::contains("No claude-slash installation found"))
        .stderr(predicate::str::contains("installer"));
}

#[tokio::test]
async fn test_update_check_does_not_modify() {
    let env = TestEnv::new().unwrap();
    env.install_global(&[("save.md", "v1")]).unwrap();
    let before = snapshot(&env.global_dir()).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    let config = env.write_config(&server).unwrap();

    run(&env, Some(config), &["update", "--check"])
        .await
        .success()
        .stdout(predicate::str::contains("Update available: unknown -> v2.0.0"));

    assert_eq!(snapshot(&env.global_dir()).unwrap(), before);
}

#[tokio::test]
async fn test_status_offline() {
    let env = TestEnv::new().unwrap();
    env.install_local(&[("a.md", "a"), ("b.md", "b")]).unwrap();
    let server = MockServer::start().await;
    let config = env.write_config(&server).unwrap();

    run(&env, Some(config), &["status", "--offline"])
        .await
        .success()
        .stdout(predicate::str::contains("local"))
        .stdout(predicate::str::contains("Commands: 2"));
}

#[tokio::test]
async fn test_backups_and_rollback_commands() {
    let env = TestEnv::new().unwrap();
    env.install_local(&[("save.md", "v1")]).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    mount_archive(&server, "v2.0.0", release_archive("v2.0.0", &[("save.md", "v2")]).unwrap())
        .await;
    let config = env.write_config(&server).unwrap();

    run(&env, Some(config.clone()), &["update"]).await.success();
    run(&env, Some(config.clone()), &["backups", "list"])
        .await
        .success()
        .stdout(predicate::str::contains("commands.backup."));

    run(&env, Some(config.clone()), &["rollback"]).await.success();
    assert_eq!(std::fs::read_to_string(env.local_dir().join("save.md")).unwrap(), "v1");

    run(&env, Some(config.clone()), &["backups", "prune", "--keep", "0"])
        .await
        .success()
        .stdout(predicate::str::contains("Removed"));
    run(&env, Some(config), &["backups", "list"])
        .await
        .success()
        .stdout(predicate::str::contains("No backups found"));
}

#[tokio::test]
async fn test_invalid_config_is_reported() {
    let env = TestEnv::new().unwrap();
    let config = env.home.join("broken.toml");
    std::fs::write(&config, "[update\nrepository = ").unwrap();

    run(&env, Some(config), &["status"])
        .await
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[tokio::test]
async fn test_missing_config_file_is_reported() {
    let env = TestEnv::new().unwrap();
    env.install_local(&[("save.md", "v1")]).unwrap();

    run(&env, Some(env.home.join("absent.toml")), &["status", "--offline"])
        .await
        .code(1)
        .stderr(predicate::str::contains("absent.toml"))
        .stderr(predicate::str::contains("does not exist"));
}
