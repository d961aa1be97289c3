//! Mock git driver for testing

#![allow(dead_code)]

use async_trait::async_trait;
use gitops_promote::error::{Error, Result};
use gitops_promote::git::GitOps;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One recorded git operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Clone { url: String },
    SetRemoteUrl { name: String, url: String },
    Fetch { remote: String },
    PullUpstream { remote: String, branch: String },
    RemoteBranchNames { prefix: String },
    CreateBranch { name: String },
    Stash,
    Checkout { name: String },
    Add { patterns: Vec<String> },
    HasChanges,
    Commit { message: String },
    Push { branch: String },
    ForcePush { local: String, remote: String },
}

/// Records git calls instead of running git.
///
/// `push` publishes the checked out branch so later runs see it as a
/// remote branch.
pub struct MockGit {
    calls: Mutex<Vec<GitCall>>,
    remote_branches: Mutex<Vec<String>>,
    current_branch: Mutex<String>,
    has_changes: AtomicBool,
    error_on_clone: Mutex<Option<String>>,
    error_on_push: Mutex<Option<String>>,
}

impl Default for MockGit {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGit {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            remote_branches: Mutex::new(vec!["master".to_string()]),
            current_branch: Mutex::new("master".to_string()),
            has_changes: AtomicBool::new(true),
            error_on_clone: Mutex::new(None),
            error_on_push: Mutex::new(None),
        }
    }

    /// Pretend `name` already exists on `origin`
    pub fn add_remote_branch(&self, name: &str) {
        self.remote_branches.lock().unwrap().push(name.to_string());
    }

    pub fn set_has_changes(&self, changed: bool) {
        self.has_changes.store(changed, Ordering::SeqCst);
    }

    pub fn fail_clone(&self, msg: &str) {
        *self.error_on_clone.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_push(&self, msg: &str) {
        *self.error_on_push.lock().unwrap() = Some(msg.to_string());
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn created_branches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GitCall::CreateBranch { name } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&GitCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: GitCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected(slot: &Mutex<Option<String>>, command: &str) -> Result<()> {
        match slot.lock().unwrap().as_ref() {
            Some(msg) => Err(Error::GitCommand {
                command: command.to_string(),
                dir: "/mock".to_string(),
                stderr: msg.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GitOps for MockGit {
    async fn clone_repo(&self, url: &str, _dir: &Path) -> Result<()> {
        self.record(GitCall::Clone {
            url: url.to_string(),
        });
        Self::injected(&self.error_on_clone, "clone")
    }

    async fn set_remote_url(&self, _dir: &Path, name: &str, url: &str) -> Result<()> {
        self.record(GitCall::SetRemoteUrl {
            name: name.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    async fn fetch(&self, _dir: &Path, remote: &str) -> Result<()> {
        self.record(GitCall::Fetch {
            remote: remote.to_string(),
        });
        Ok(())
    }

    async fn pull_upstream(&self, _dir: &Path, remote: &str, branch: &str) -> Result<()> {
        self.record(GitCall::PullUpstream {
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
        Ok(())
    }

    async fn remote_branch_names(&self, _dir: &Path, prefix: &str) -> Result<Vec<String>> {
        self.record(GitCall::RemoteBranchNames {
            prefix: prefix.to_string(),
        });
        Ok(self.remote_branches.lock().unwrap().clone())
    }

    async fn create_branch(&self, _dir: &Path, name: &str) -> Result<()> {
        self.record(GitCall::CreateBranch {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn stash(&self, _dir: &Path) -> Result<()> {
        self.record(GitCall::Stash);
        Ok(())
    }

    async fn checkout(&self, _dir: &Path, name: &str) -> Result<()> {
        self.record(GitCall::Checkout {
            name: name.to_string(),
        });
        *self.current_branch.lock().unwrap() = name.to_string();
        Ok(())
    }

    async fn add(&self, _dir: &Path, patterns: &[&str]) -> Result<()> {
        self.record(GitCall::Add {
            patterns: patterns.iter().map(ToString::to_string).collect(),
        });
        Ok(())
    }

    async fn has_changes(&self, _dir: &Path) -> Result<bool> {
        self.record(GitCall::HasChanges);
        Ok(self.has_changes.load(Ordering::SeqCst))
    }

    async fn commit_dir(&self, _dir: &Path, message: &str) -> Result<()> {
        self.record(GitCall::Commit {
            message: message.to_string(),
        });
        Ok(())
    }

    async fn push(&self, _dir: &Path) -> Result<()> {
        let branch = self.current_branch.lock().unwrap().clone();
        self.record(GitCall::Push {
            branch: branch.clone(),
        });
        Self::injected(&self.error_on_push, "push")?;
        self.add_remote_branch(&branch);
        Ok(())
    }

    async fn force_push_branch(
        &self,
        _dir: &Path,
        local_branch: &str,
        remote_branch: &str,
    ) -> Result<()> {
        self.record(GitCall::ForcePush {
            local: local_branch.to_string(),
            remote: remote_branch.to_string(),
        });
        Self::injected(&self.error_on_push, "push -f")
    }
}
