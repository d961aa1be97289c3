//! Local working copy operations
//!
//! The promotion engine only needs a handful of git primitives. They are
//! expressed as the [`GitOps`] trait so the coordinator can be driven by the
//! real `git` executable ([`GitCli`]) or by a test double.

mod cli;

pub use cli::GitCli;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Remote name a fresh clone gets
pub const ORIGIN: &str = "origin";

/// Character used in place of anything git refuses in a branch name
const REPLACEMENT_CHAR: char = '_';

/// Git operations against a local working directory
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Clone `url` into `dir`
    async fn clone_repo(&self, url: &str, dir: &Path) -> Result<()>;

    /// Point remote `name` at `url`, adding the remote if it does not exist
    async fn set_remote_url(&self, dir: &Path, name: &str, url: &str) -> Result<()>;

    /// Fetch and prune remote `remote`
    async fn fetch(&self, dir: &Path, remote: &str) -> Result<()>;

    /// Pull `branch` from `remote` into the current branch
    async fn pull_upstream(&self, dir: &Path, remote: &str, branch: &str) -> Result<()>;

    /// Branch names from `git branch -a` that start with `prefix`, with the
    /// prefix removed. An empty prefix returns every name.
    async fn remote_branch_names(&self, dir: &Path, prefix: &str) -> Result<Vec<String>>;

    /// Create local branch `name` at `HEAD`, moving it if it already exists
    async fn create_branch(&self, dir: &Path, name: &str) -> Result<()>;

    /// Set aside uncommitted changes, untracked files included
    async fn stash(&self, dir: &Path) -> Result<()>;

    /// Check out `name`
    async fn checkout(&self, dir: &Path, name: &str) -> Result<()>;

    /// Stage files matching `patterns`
    async fn add(&self, dir: &Path, patterns: &[&str]) -> Result<()>;

    /// Whether the working copy or index differ from `HEAD`
    async fn has_changes(&self, dir: &Path) -> Result<bool>;

    /// Commit staged changes with `message`
    async fn commit_dir(&self, dir: &Path, message: &str) -> Result<()>;

    /// Push `HEAD` to the same-named branch on `origin`
    async fn push(&self, dir: &Path) -> Result<()>;

    /// Force-push `local_branch` onto `remote_branch` on `origin`
    async fn force_push_branch(
        &self,
        dir: &Path,
        local_branch: &str,
        remote_branch: &str,
    ) -> Result<()>;
}

/// Turn arbitrary text into something git accepts as a branch name.
///
/// A trailing `/` and `.lock` suffix are dropped, control characters,
/// whitespace, `~`, `^` and `:` become `_`, and consecutive replacements
/// collapse into one.
pub fn convert_to_valid_branch_name(text: &str) -> String {
    let text = text.strip_suffix('/').unwrap_or(text);
    let text = text.strip_suffix(".lock").unwrap_or(text);

    let mut answer = String::with_capacity(text.len());
    let mut last = ' ';
    for ch in text.chars() {
        let ch = if ch <= ' ' || matches!(ch, '~' | '^' | ':') {
            REPLACEMENT_CHAR
        } else {
            ch
        };
        if ch != REPLACEMENT_CHAR || last != REPLACEMENT_CHAR {
            answer.push(ch);
        }
        last = ch;
    }
    answer
}
