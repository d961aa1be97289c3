//! `git` executable backed implementation of [`GitOps`]

use super::{GitOps, ORIGIN};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Runs git commands as child processes
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    identity: Option<(String, String)>,
    config: Vec<(String, String)>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Use the `git` found on `PATH`
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
            identity: None,
            config: Vec::new(),
        }
    }

    /// Commit as `name <email>` regardless of the user's git config
    #[must_use]
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    /// Pass `-c key=value` to every git invocation
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir).env("GIT_TERMINAL_PROMPT", "0");
        for (key, value) in &self.config {
            cmd.arg("-c").arg(format!("{key}={value}"));
        }
        if let Some((name, email)) = &self.identity {
            cmd.env("GIT_AUTHOR_NAME", name)
                .env("GIT_AUTHOR_EMAIL", email)
                .env("GIT_COMMITTER_NAME", name)
                .env("GIT_COMMITTER_EMAIL", email);
        }
        cmd
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        debug!(dir = %dir.display(), ?args, "running git");
        let output = self.command(dir).args(args).output().await?;

        if !output.status.success() {
            return Err(Error::GitCommand {
                command: args.join(" "),
                dir: dir.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// Parse `git branch -a` output, keeping names under `prefix`
fn parse_branch_names(text: &str, prefix: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_start_matches("* ").trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            if prefix.is_empty() {
                Some(line.to_string())
            } else {
                line.strip_prefix(prefix).map(ToString::to_string)
            }
        })
        .collect()
}

#[async_trait]
impl GitOps for GitCli {
    async fn clone_repo(&self, url: &str, dir: &Path) -> Result<()> {
        let parent = dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        let target = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::GitCommand {
                command: format!("clone {url}"),
                dir: dir.display().to_string(),
                stderr: "clone target has no directory name".to_string(),
            })?;
        self.run(parent, &["clone", url, &target]).await?;
        Ok(())
    }

    async fn set_remote_url(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        if self
            .run(dir, &["remote", "set-url", name, url])
            .await
            .is_ok()
        {
            return Ok(());
        }
        self.run(dir, &["remote", "add", name, url]).await?;
        Ok(())
    }

    async fn fetch(&self, dir: &Path, remote: &str) -> Result<()> {
        self.run(dir, &["fetch", "--prune", remote]).await?;
        Ok(())
    }

    async fn pull_upstream(&self, dir: &Path, remote: &str, branch: &str) -> Result<()> {
        self.run(dir, &["pull", "--no-rebase", "--no-edit", remote, branch])
            .await?;
        Ok(())
    }

    async fn remote_branch_names(&self, dir: &Path, prefix: &str) -> Result<Vec<String>> {
        let text = self.run(dir, &["branch", "-a"]).await?;
        Ok(parse_branch_names(&text, prefix))
    }

    async fn create_branch(&self, dir: &Path, name: &str) -> Result<()> {
        self.run(dir, &["branch", "--force", name]).await?;
        Ok(())
    }

    async fn stash(&self, dir: &Path) -> Result<()> {
        self.run(dir, &["stash", "push", "--include-untracked", "--quiet"])
            .await?;
        Ok(())
    }

    async fn checkout(&self, dir: &Path, name: &str) -> Result<()> {
        self.run(dir, &["checkout", name]).await?;
        Ok(())
    }

    async fn add(&self, dir: &Path, patterns: &[&str]) -> Result<()> {
        let mut args = vec!["add"];
        args.extend_from_slice(patterns);
        self.run(dir, &args).await?;
        Ok(())
    }

    async fn has_changes(&self, dir: &Path) -> Result<bool> {
        let text = self.run(dir, &["status", "--porcelain"]).await?;
        Ok(!text.trim().is_empty())
    }

    async fn commit_dir(&self, dir: &Path, message: &str) -> Result<()> {
        self.run(dir, &["commit", "-m", message]).await?;
        Ok(())
    }

    async fn push(&self, dir: &Path) -> Result<()> {
        self.run(dir, &["push", "--set-upstream", ORIGIN, "HEAD"])
            .await?;
        Ok(())
    }

    async fn force_push_branch(
        &self,
        dir: &Path,
        local_branch: &str,
        remote_branch: &str,
    ) -> Result<()> {
        let refspec = format!("{local_branch}:{remote_branch}");
        self.run(dir, &["push", "-f", ORIGIN, &refspec]).await?;
        Ok(())
    }
}
