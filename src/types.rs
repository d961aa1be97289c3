//! Core types for gitops-promote

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Base branch used when a request does not name one
pub const DEFAULT_BASE_BRANCH: &str = "master";

/// What the caller wants recorded in an environment repository
#[derive(Debug, Clone)]
pub struct PullRequestRequest {
    /// Local directory the repository is cloned into
    pub dir: PathBuf,
    /// URL of the target (upstream) repository
    pub git_url: String,
    /// Branch the pull request targets
    pub base: String,
    /// Text the branch name is derived from
    pub branch_name_seed: String,
    /// Pull request title; also identifies "the same logical change"
    pub title: String,
    /// Pull request body, also used for the update comment
    pub body: String,
    /// Labels applied to a newly created pull request
    pub labels: Vec<String>,
}

impl PullRequestRequest {
    /// Create a request targeting [`DEFAULT_BASE_BRANCH`]
    pub fn new(
        dir: impl Into<PathBuf>,
        git_url: impl Into<String>,
        branch_name_seed: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            git_url: git_url.into(),
            base: DEFAULT_BASE_BRANCH.to_string(),
            branch_name_seed: branch_name_seed.into(),
            title: title.into(),
            body: body.into(),
            labels: Vec::new(),
        }
    }

    /// Target a different base branch; an empty name keeps the default
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        if !base.is_empty() {
            self.base = base;
        }
        self
    }

    /// Labels to apply when the pull request is created
    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

/// A hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Owner (user, organisation or group path)
    pub owner: String,
    /// Repository name
    pub name: String,
    /// URL used by `git clone`
    pub clone_url: String,
    /// Web URL
    pub html_url: String,
    /// Whether the repository is a fork
    pub fork: bool,
}

/// A pull request / merge request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// Web URL for the PR/MR
    pub url: String,
    /// Owner of the target repository
    pub owner: String,
    /// Name of the target repository
    pub repo: String,
    /// PR/MR title
    pub title: String,
    /// PR/MR body
    pub body: Option<String>,
    /// Login of the author
    pub author: Option<String>,
    /// Head reference, possibly in `owner:branch` form
    pub head_ref: Option<String>,
    /// SHA of the last commit on the head
    pub last_commit_sha: Option<String>,
    /// Whether the PR has been merged
    pub merged: bool,
    /// Whether the PR has been closed
    pub closed: bool,
}

impl PullRequest {
    /// Whether the pull request is closed (merged or not)
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Branch name part of the head reference (text after the last `:`)
    pub fn head_branch(&self) -> Option<&str> {
        self.head_ref
            .as_deref()
            .filter(|head| !head.is_empty())
            .and_then(|head| head.rsplit(':').next())
            .filter(|branch| !branch.is_empty())
    }

    /// Commit SHA for display, or an empty string when unknown
    pub fn sha_display(&self) -> &str {
        self.last_commit_sha.as_deref().unwrap_or_default()
    }
}

/// Arguments used to create or update a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestArguments {
    /// Owner of the target repository
    pub owner: String,
    /// Name of the target repository
    pub repo: String,
    /// Head in `owner:branch` form
    pub head: String,
    /// Base branch
    pub base: String,
    /// Title
    pub title: String,
    /// Body
    pub body: String,
    /// Labels
    pub labels: Vec<String>,
}

impl std::fmt::Display for PullRequestArguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} {} -> {} \"{}\"",
            self.owner, self.repo, self.head, self.base, self.title
        )
    }
}

/// How the coordinator arrived at the pull request it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestAction {
    /// A new pull request was opened
    Created,
    /// An existing pull request was force-pushed and updated in place
    Updated,
}

/// Result of a successful create-or-update
#[derive(Debug, Clone)]
pub struct PullRequestInfo {
    /// The pull request
    pub pull_request: PullRequest,
    /// Arguments used for it
    pub arguments: PullRequestArguments,
    /// Whether it was created or updated
    pub action: PullRequestAction,
}

/// Commit status state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitState {
    /// All checks passed
    Success,
    /// Checks still running
    Pending,
    /// A check errored
    Error,
    /// A check failed
    Failure,
    /// Anything else the provider reported, kept verbatim
    Other(String),
}

impl CommitState {
    /// Parse a provider state string
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "pending" | "running" | "created" | "waiting_for_resource" | "preparing"
            | "scheduled" => Self::Pending,
            "error" | "canceled" => Self::Error,
            "failure" | "failed" => Self::Failure,
            _ => Self::Other(state.to_string()),
        }
    }

    /// Whether the state ends the wait with a failure
    pub const fn is_failing(&self) -> bool {
        matches!(self, Self::Error | Self::Failure)
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Pending => write!(f, "pending"),
            Self::Error => write!(f, "error"),
            Self::Failure => write!(f, "failure"),
            Self::Other(state) => write!(f, "{state}"),
        }
    }
}

/// Context name the tide auto-merger reports under
pub const TIDE_CONTEXT: &str = "tide";

/// A single status entry on a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Reported state
    pub state: CommitState,
    /// Context (the reporting system, e.g. `tide`)
    pub context: String,
}

impl CommitStatus {
    /// Whether this entry comes from the tide auto-merger
    pub fn is_tide(&self) -> bool {
        self.context == TIDE_CONTEXT
            || matches!(&self.state, CommitState::Other(state) if state == TIDE_CONTEXT)
    }
}

/// Detected platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
            Self::GitLab => write!(f, "GitLab"),
        }
    }
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com/gitlab.com)
    pub host: Option<String>,
}
