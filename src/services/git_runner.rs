//! Runs `git clone` / `git pull` as cancellable child processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::errors::GitError;
use crate::types::repository::Repository;
use crate::types::settings::PathSettings;

/// How a git invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitOutcome {
    Succeeded,
    /// Non-zero exit; carries git's stderr.
    Failed(String),
    Cancelled,
}

/// A fully resolved git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    pub args: Vec<String>,
    /// Directory the command operates on (clone destination or pulled checkout).
    pub target: PathBuf,
    /// Created before spawning, if set.
    pub ensure_dir: Option<PathBuf>,
}

pub struct GitRunner {
    program: String,
}

impl Default for GitRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRunner {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// `<git_path>/<repo>`, or `<git_path>/<owner>/<repo>` with org structure.
    pub fn clone_target(paths: &PathSettings, repo: &Repository) -> PathBuf {
        let root = PathBuf::from(&paths.git_path);
        if paths.git_use_org_structure {
            root.join(&repo.owner.login).join(&repo.name)
        } else {
            root.join(&repo.name)
        }
    }

    pub fn clone_command(paths: &PathSettings, repo: &Repository) -> Result<GitCommand, GitError> {
        let target = Self::clone_target(paths, repo);
        if target.exists() {
            return Err(GitError::InvalidTarget(format!(
                "{} already exists",
                target.display()
            )));
        }
        let url = if repo.clone_url.is_empty() {
            format!("{}.git", repo.html_url)
        } else {
            repo.clone_url.clone()
        };

        let mut args = vec!["clone".to_string()];
        if paths.git_clone_recursive {
            args.push("--recursive".to_string());
        }
        args.push(url);
        args.push(target.to_string_lossy().into_owned());

        Ok(GitCommand {
            args,
            ensure_dir: target.parent().map(Path::to_path_buf),
            target,
        })
    }

    pub fn pull_command(dir: &Path) -> Result<GitCommand, GitError> {
        if !dir.is_dir() {
            return Err(GitError::InvalidTarget(format!("{} is not a directory", dir.display())));
        }
        Ok(GitCommand {
            args: vec![
                "-C".to_string(),
                dir.to_string_lossy().into_owned(),
                "pull".to_string(),
            ],
            target: dir.to_path_buf(),
            ensure_dir: None,
        })
    }

    /// Runs `command` until it exits or `cancel` fires. Cancelling kills the
    /// child process.
    pub async fn run(&self, command: &GitCommand, cancel: &CancellationToken) -> Result<GitOutcome, GitError> {
        if let Some(dir) = &command.ensure_dir {
            std::fs::create_dir_all(dir).map_err(|e| GitError::InvalidTarget(e.to_string()))?;
        }

        debug!(program = %self.program, args = ?command.args, "spawning git");
        let mut child = Command::new(&self.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GitError::Spawn(e.to_string()))?;

        let stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| GitError::Spawn(e.to_string()))?;
                let stderr = stderr_reader.await.unwrap_or_default();
                if status.success() {
                    info!(target_dir = %command.target.display(), "git finished");
                    Ok(GitOutcome::Succeeded)
                } else {
                    let message = match stderr.trim() {
                        "" => format!("git exited with {}", status),
                        text => text.to_string(),
                    };
                    warn!(%message, "git failed");
                    Ok(GitOutcome::Failed(message))
                }
            }
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill git");
                }
                stderr_reader.abort();
                info!(target_dir = %command.target.display(), "git cancelled");
                Ok(GitOutcome::Cancelled)
            }
        }
    }
}
