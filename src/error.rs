//! Error types for gitops-promote
//!
//! Every error reports an [`ErrorKind`] so callers can branch on the class of
//! failure without matching on message text.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Resolving the user, repository, fork, clone, remotes or branch failed
    Setup,
    /// The change applier callback failed
    Apply,
    /// Staging, committing or pushing failed
    Push,
    /// Listing, creating or updating a pull request failed
    PullRequest,
    /// Refreshing the pull request state while waiting failed
    MergeStatus,
    /// The last commit of the pull request reported `error` or `failure`
    MergeFailed,
    /// The pull request was closed without being merged
    MergeClosed,
    /// The pull request did not merge before the deadline
    MergeTimeout,
    /// A hosted git provider call failed
    Platform,
    /// A local git command failed
    Git,
    /// Configuration could not be loaded
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Apply => "apply",
            Self::Push => "push",
            Self::PullRequest => "pull-request",
            Self::MergeStatus => "merge-status",
            Self::MergeFailed => "merge-failed",
            Self::MergeClosed => "merge-closed",
            Self::MergeTimeout => "merge-timeout",
            Self::Platform => "platform",
            Self::Git => "git",
            Self::Config => "config",
        };
        write!(f, "{name}")
    }
}

/// Errors produced by the promotion engine
#[derive(Debug, Error)]
pub enum Error {
    /// The provider did not report an authenticated user
    #[error("no username resolved from the git provider; check authentication")]
    MissingUsername,

    /// Neither the user's copy nor a fork of the repository is available
    #[error("repository {owner}/{name} not found")]
    RepositoryNotFound {
        /// Repository owner
        owner: String,
        /// Repository name
        name: String,
    },

    /// A step of the promotion failed; `action` names what was being done
    #[error("{action}: {source}")]
    Step {
        /// Classification of the failed step
        kind: ErrorKind,
        /// Human readable description of the step
        action: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Failure raised by a change applier callback
    #[error("{0}")]
    Apply(String),

    /// The pull request was closed without merging
    #[error("promotion failed as pull request {url} is closed without merging")]
    PullRequestClosed {
        /// Pull request URL
        url: String,
    },

    /// The last commit of the pull request has a failing status
    #[error("pull request {url} last commit has status {status} for ref {sha}")]
    CommitStatusFailed {
        /// Pull request URL
        url: String,
        /// Reported combined status
        status: String,
        /// Commit SHA the status belongs to
        sha: String,
    },

    /// Waiting for the merge ran past the deadline
    #[error("timed out waiting for pull request {url} to merge. Waited {waited:?}")]
    MergeTimeout {
        /// Pull request URL
        url: String,
        /// The configured timeout
        waited: Duration,
    },

    /// A git command exited unsuccessfully
    #[error("git {command} failed in {dir}: {stderr}")]
    GitCommand {
        /// The git arguments that were run
        command: String,
        /// Working directory of the command
        dir: String,
        /// Trimmed stderr output
        stderr: String,
    },

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API error
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Generic platform error (used by providers without a dedicated variant)
    #[error("platform error: {0}")]
    Platform(String),

    /// No token could be found for the provider
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The repository URL could not be understood
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Octocrab error
    #[error("GitHub API error: {0}")]
    Octocrab(#[from] octocrab::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap `source` with the action that failed
    pub fn step(kind: ErrorKind, action: impl Into<String>, source: Self) -> Self {
        Self::Step {
            kind,
            action: action.into(),
            source: Box::new(source),
        }
    }

    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Step { kind, .. } => *kind,
            Self::MissingUsername | Self::RepositoryNotFound { .. } => ErrorKind::Setup,
            Self::Apply(_) => ErrorKind::Apply,
            Self::PullRequestClosed { .. } => ErrorKind::MergeClosed,
            Self::CommitStatusFailed { .. } => ErrorKind::MergeFailed,
            Self::MergeTimeout { .. } => ErrorKind::MergeTimeout,
            Self::GitCommand { .. } | Self::Io(_) => ErrorKind::Git,
            Self::Config(_) => ErrorKind::Config,
            Self::GitHubApi(_)
            | Self::GitLabApi(_)
            | Self::Platform(_)
            | Self::Auth(_)
            | Self::InvalidUrl(_)
            | Self::Http(_)
            | Self::Octocrab(_)
            | Self::Json(_) => ErrorKind::Platform,
        }
    }
}

/// Extension for attaching the failed action to a `Result`
pub trait ResultExt<T> {
    /// Wrap the error, if any, as a step of the given kind
    fn step(self, kind: ErrorKind, action: impl FnOnce() -> String) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn step(self, kind: ErrorKind, action: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| Error::step(kind, action(), e))
    }
}
