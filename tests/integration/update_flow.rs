//! End-to-end update scenarios against a mock release host.

use crate::common::{
    INDEX_PATH, TestEnv, file_names, mount_archive, mount_index, release_archive, snapshot,
    zip_with_prefix,
};
use claude_slash::core::SlashError;
use claude_slash::update::{
    BackupManager, RollbackOutcome, RunOutcome, UpdateLock, UpdatePhase, UpdateResult,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_successful_update_installs_archive_contents() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "old save"), ("stale.md", "gone")]).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    mount_archive(
        &server,
        "v2.0.0",
        release_archive("v2.0.0", &[("save.md", "new save"), ("bookmark.md", "bookmark")])
            .unwrap(),
    )
    .await;

    let outcome = env.manager(&server).unwrap().run(false).await.unwrap();

    let RunOutcome::Completed {
        result: UpdateResult::Succeeded {
            release,
            backup_path,
        },
        ..
    } = outcome
    else {
        panic!("expected a successful update");
    };
    assert_eq!(release.tag.as_str(), "v2.0.0");

    // No stale files survive
    assert_eq!(file_names(installation.root()).unwrap(), vec!["bookmark.md", "save.md"]);
    assert_eq!(
        std::fs::read_to_string(installation.root().join("save.md")).unwrap(),
        "new save"
    );

    // The backup holds the previous version and is kept
    assert_eq!(file_names(&backup_path).unwrap(), vec!["save.md", "stale.md"]);
    assert_eq!(installation.installed_version().unwrap().as_deref(), Some("v2.0.0"));

    // Staging is gone
    assert!(
        env.local_siblings().unwrap().iter().all(|name| !name.contains("staging")),
        "staging left behind: {:?}",
        env.local_siblings().unwrap()
    );
}

#[tokio::test]
async fn test_malformed_release_index_changes_nothing() {
    for body in ["", "not json", r#"{"name":"no tag"}"#, r#"{"tag_name":"../../etc"}"#] {
        let env = TestEnv::new().unwrap();
        let installation = env.install_local(&[("save.md", "v1")]).unwrap();
        let before = snapshot(installation.root()).unwrap();
        let siblings_before = env.local_siblings().unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INDEX_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let err = env.manager(&server).unwrap().run(false).await.unwrap_err();

        assert!(matches!(err, SlashError::ReleaseNotFound { .. }), "body {body:?} gave {err:?}");
        assert_eq!(snapshot(installation.root()).unwrap(), before);
        assert_eq!(env.local_siblings().unwrap(), siblings_before);
    }
}

#[tokio::test]
async fn test_release_index_http_error_is_network_error() {
    let env = TestEnv::new().unwrap();
    env.install_local(&[("save.md", "v1")]).unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INDEX_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = env.manager(&server).unwrap().run(false).await.unwrap_err();
    let SlashError::Network {
        reason,
        ..
    } = err
    else {
        panic!("expected network error");
    };
    assert!(reason.contains("503"));
}

#[tokio::test]
async fn test_failed_download_restores_original_files() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "v1"), ("nested.md", "n")]).unwrap();
    let before = snapshot(installation.root()).unwrap();

    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    Mock::given(method("GET"))
        .and(path("/archive/v2.0.0.zip"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = env.manager(&server).unwrap().run(false).await.unwrap();

    let RunOutcome::Completed {
        result: UpdateResult::Failed(failure),
        ..
    } = outcome
    else {
        panic!("expected a failed update");
    };
    assert_eq!(failure.phase, UpdatePhase::Downloading);
    assert!(matches!(failure.reason, SlashError::Network { .. }));
    assert_eq!(
        failure.rollback,
        RollbackOutcome::Restored {
            backup_path: None
        }
    );

    assert_eq!(snapshot(installation.root()).unwrap(), before);
    assert_eq!(installation.installed_version().unwrap(), None);
    // The consumed backup and the staging directory are both gone
    assert_eq!(env.local_siblings().unwrap(), vec![".commands.update.lock", "commands"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_download_restores_symlinked_commands() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "v1")]).unwrap();
    std::fs::write(env.project.join(".claude/shared.md"), "shared").unwrap();
    std::os::unix::fs::symlink("../shared.md", installation.root().join("linked.md")).unwrap();
    let before = snapshot(installation.root()).unwrap();

    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    Mock::given(method("GET"))
        .and(path("/archive/v2.0.0.zip"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = env.manager(&server).unwrap().run(false).await.unwrap();

    let RunOutcome::Completed {
        result: UpdateResult::Failed(failure),
        ..
    } = outcome
    else {
        panic!("expected a failed update");
    };
    assert!(failure.rollback.succeeded());
    assert_eq!(snapshot(installation.root()).unwrap(), before);
    let linked = installation.root().join("linked.md");
    assert!(std::fs::symlink_metadata(&linked).unwrap().file_type().is_symlink());
    assert_eq!(std::fs::read_to_string(linked).unwrap(), "shared");
}

#[tokio::test]
async fn test_no_installation_is_not_found() {
    let env = TestEnv::new().unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;

    let err = env.manager(&server).unwrap().run(false).await.unwrap_err();

    let SlashError::InstallationNotFound {
        searched,
    } = &err
    else {
        panic!("expected installation not found, got {err:?}");
    };
    assert_eq!(searched.len(), 2);
    assert!(err.is_not_found());

    // Nothing may be requested before an installation exists
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_archive_without_resources_rolls_back() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "v1")]).unwrap();
    let before = snapshot(installation.root()).unwrap();

    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    let archive = zip_with_prefix(
        "claude-slash-2.0.0",
        &[("docs/readme.md".to_string(), "no commands here".to_string())],
    )
    .unwrap();
    mount_archive(&server, "v2.0.0", archive).await;

    let outcome = env.manager(&server).unwrap().run(false).await.unwrap();

    let RunOutcome::Completed {
        result: UpdateResult::Failed(failure),
        ..
    } = outcome
    else {
        panic!("expected a failed update");
    };
    assert_eq!(failure.phase, UpdatePhase::Verifying);
    assert!(matches!(failure.reason, SlashError::Archive { .. }));
    assert!(failure.rollback.succeeded());
    assert!(failure.to_error().to_string().contains(".claude/commands"));

    assert_eq!(snapshot(installation.root()).unwrap(), before);
}

#[tokio::test]
async fn test_corrupt_archive_rolls_back() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "v1")]).unwrap();
    let before = snapshot(installation.root()).unwrap();

    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    mount_archive(&server, "v2.0.0", b"<html>rate limited</html>".to_vec()).await;

    let outcome = env.manager(&server).unwrap().run(false).await.unwrap();

    let RunOutcome::Completed {
        result: UpdateResult::Failed(failure),
        ..
    } = outcome
    else {
        panic!("expected a failed update");
    };
    assert_eq!(failure.phase, UpdatePhase::Downloading);
    assert!(matches!(failure.reason, SlashError::Archive { .. }));
    assert_eq!(snapshot(installation.root()).unwrap(), before);
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("old.md", "old")]).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    mount_archive(&server, "v2.0.0", release_archive("v2.0.0", &[("save.md", "new")]).unwrap())
        .await;

    let manager = env.manager(&server).unwrap();
    manager.run(false).await.unwrap();
    let after_first = snapshot(installation.root()).unwrap();
    let backups_after_first = BackupManager::new(installation.clone()).list().unwrap().len();

    let second = manager.run(false).await.unwrap();

    assert!(matches!(second, RunOutcome::AlreadyCurrent { .. }));
    assert_eq!(snapshot(installation.root()).unwrap(), after_first);
    assert_eq!(
        BackupManager::new(installation.clone()).list().unwrap().len(),
        backups_after_first
    );

    // Forcing re-installs the same content
    let forced = manager.run(true).await.unwrap();
    assert!(matches!(
        forced,
        RunOutcome::Completed {
            result: UpdateResult::Succeeded { .. },
            ..
        }
    ));
    assert_eq!(snapshot(installation.root()).unwrap(), after_first);
}

#[tokio::test]
async fn test_update_while_locked_fails_without_mutation() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "v1")]).unwrap();
    let before = snapshot(installation.root()).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    mount_archive(&server, "v2.0.0", release_archive("v2.0.0", &[("save.md", "v2")]).unwrap())
        .await;

    let _held = UpdateLock::try_acquire(&installation).await.unwrap();
    let err = env.manager(&server).unwrap().run(false).await.unwrap_err();

    assert!(matches!(err, SlashError::ConcurrentUpdate { .. }));
    assert_eq!(snapshot(installation.root()).unwrap(), before);
    assert!(BackupManager::new(installation).list().unwrap().is_empty());
}

#[tokio::test]
async fn test_global_installation_is_updated_when_no_local_one() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_global(&[("save.md", "v1")]).unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    mount_archive(&server, "v2.0.0", release_archive("v2.0.0", &[("save.md", "v2")]).unwrap())
        .await;

    let outcome = env.manager(&server).unwrap().run(false).await.unwrap();

    let RunOutcome::Completed {
        installation: updated,
        result: UpdateResult::Succeeded { .. },
    } = outcome
    else {
        panic!("expected a successful update");
    };
    assert_eq!(updated.root(), installation.root());
    assert_eq!(std::fs::read_to_string(installation.root().join("save.md")).unwrap(), "v2");
    assert!(!env.local_dir().exists());
}

#[tokio::test]
async fn test_check_reports_available_update() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "v1")]).unwrap();
    installation.record_version("v1.2.1").unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;

    let status = env.manager(&server).unwrap().check().await.unwrap();

    assert_eq!(status.installed.as_deref(), Some("v1.2.1"));
    assert_eq!(status.latest.tag.as_str(), "v2.0.0");
    assert!(status.update_available);
    assert_eq!(
        status.latest.archive_url.as_str(),
        format!("{}/archive/v2.0.0.zip", server.uri())
    );
}

#[tokio::test]
async fn test_check_and_run_agree_on_unprefixed_marker() {
    let env = TestEnv::new().unwrap();
    let installation = env.install_local(&[("save.md", "v2")]).unwrap();
    installation.record_version("2.0.0").unwrap();
    let server = MockServer::start().await;
    mount_index(&server, "v2.0.0").await;
    let manager = env.manager(&server).unwrap();

    let status = manager.check().await.unwrap();
    assert!(!status.update_available);

    let outcome = manager.run(false).await.unwrap();
    assert!(matches!(outcome, RunOutcome::AlreadyCurrent { .. }));
    assert!(BackupManager::new(installation).list().unwrap().is_empty());
}
