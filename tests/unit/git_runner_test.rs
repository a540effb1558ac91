//! Clone/pull command construction and child process handling.

use std::path::PathBuf;
use std::time::Duration;

use gitdesk::services::git_runner::{GitCommand, GitOutcome, GitRunner};
use gitdesk::types::errors::GitError;
use gitdesk::types::repository::Repository;
use gitdesk::types::settings::PathSettings;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn repository() -> Repository {
    serde_json::from_value(json!({
        "id": 5,
        "name": "widgets",
        "full_name": "acme/widgets",
        "owner": {"login": "acme"},
        "html_url": "https://github.com/acme/widgets",
        "clone_url": ""
    }))
    .unwrap()
}

fn settings(root: &TempDir, org: bool) -> PathSettings {
    PathSettings {
        git_path: root.path().to_string_lossy().into_owned(),
        git_use_org_structure: org,
        ..PathSettings::default()
    }
}

fn command(args: &[&str], target: PathBuf) -> GitCommand {
    GitCommand {
        args: args.iter().map(|a| a.to_string()).collect(),
        target,
        ensure_dir: None,
    }
}

#[test]
fn test_clone_falls_back_to_html_url() {
    let root = TempDir::new().unwrap();
    let cmd = GitRunner::clone_command(&settings(&root, true), &repository()).unwrap();

    assert_eq!(
        cmd.args,
        vec![
            "clone".to_string(),
            "https://github.com/acme/widgets.git".to_string(),
            root.path().join("acme").join("widgets").to_string_lossy().into_owned(),
        ]
    );
    assert_eq!(cmd.ensure_dir, Some(root.path().join("acme")));
}

#[test]
fn test_clone_refuses_existing_target() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir(root.path().join("widgets")).unwrap();

    let err = GitRunner::clone_command(&settings(&root, false), &repository()).unwrap_err();
    assert!(matches!(err, GitError::InvalidTarget(ref m) if m.contains("already exists")));
}

#[test]
fn test_pull_runs_in_checkout() {
    let root = TempDir::new().unwrap();
    let cmd = GitRunner::pull_command(root.path()).unwrap();
    assert_eq!(cmd.args[0], "-C");
    assert_eq!(cmd.args[1], root.path().to_string_lossy());
    assert_eq!(cmd.target, root.path());
}

#[tokio::test]
async fn test_missing_program_is_a_spawn_error() {
    let root = TempDir::new().unwrap();
    let runner = GitRunner::with_program("gitdesk-no-such-git-binary");

    let result = runner
        .run(&command(&["status"], root.path().to_path_buf()), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GitError::Spawn(_))));
}

#[tokio::test]
async fn test_ensure_dir_created_before_spawn() {
    let root = TempDir::new().unwrap();
    let parent = root.path().join("acme");
    let mut cmd = command(&["--version"], parent.join("widgets"));
    cmd.ensure_dir = Some(parent.clone());

    let _ = GitRunner::with_program("gitdesk-no-such-git-binary")
        .run(&cmd, &CancellationToken::new())
        .await;

    assert!(parent.is_dir());
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let root = TempDir::new().unwrap();
        let outcome = GitRunner::with_program("true")
            .run(&command(&[], root.path().to_path_buf()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, GitOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let root = TempDir::new().unwrap();
        let script = "echo 'fatal: repository not found' >&2; exit 128";

        let outcome = GitRunner::with_program("sh")
            .run(&command(&["-c", script], root.path().to_path_buf()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, GitOutcome::Failed("fatal: repository not found".to_string()));
    }

    #[tokio::test]
    async fn test_silent_failure_reports_exit_status() {
        let root = TempDir::new().unwrap();
        let outcome = GitRunner::with_program("false")
            .run(&command(&[], root.path().to_path_buf()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, GitOutcome::Failed(ref m) if m.starts_with("git exited with")));
    }

    #[tokio::test]
    async fn test_cancel_kills_the_child() {
        let root = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = GitRunner::with_program("sleep")
            .run(&command(&["30"], root.path().to_path_buf()), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome, GitOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
