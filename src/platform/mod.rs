//! Platform services for GitHub and GitLab
//!
//! Each provider feature the promotion engine relies on is its own trait, so
//! the type system says what a provider implements. Forking is the one
//! capability a provider may legitimately lack; it is exposed through
//! [`Capability`] rather than a runtime type check.

mod detection;
mod factory;
mod github;
mod gitlab;

pub use detection::{
    detect_platform, detect_platform_with, parse_repo_info, parse_repo_info_with,
};
pub use factory::create_platform_service;
pub use github::GitHubService;
pub use gitlab::GitLabService;

use crate::error::Result;
use crate::types::{
    CommitState, CommitStatus, PlatformConfig, PullRequest, PullRequestArguments, Repository,
};
use async_trait::async_trait;

/// A provider feature that may be missing
pub enum Capability<T> {
    /// The provider implements the feature
    Available(T),
    /// The provider does not implement the feature
    Unsupported {
        /// Why the feature is missing
        reason: &'static str,
    },
}

/// Repository lookup and identity
#[async_trait]
pub trait RepositoryService: Send + Sync {
    /// Login of the authenticated user (may be empty if unknown)
    async fn current_username(&self) -> Result<String>;

    /// Fetch a repository; `Ok(None)` when it does not exist
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>>;

    /// Forking support of this provider
    fn forking(&self) -> Capability<&dyn ForkService>;
}

/// Creating personal or organisation forks
#[async_trait]
pub trait ForkService: Send + Sync {
    /// Fork `owner/name`. An empty `organisation` forks into the user's
    /// personal namespace.
    async fn fork_repository(
        &self,
        owner: &str,
        name: &str,
        organisation: &str,
    ) -> Result<Repository>;
}

/// Pull request lifecycle
#[async_trait]
pub trait PullRequestService: Send + Sync {
    /// Open pull requests targeting `owner/name`
    async fn list_open_pull_requests(&self, owner: &str, name: &str) -> Result<Vec<PullRequest>>;

    /// Open a pull request
    async fn create_pull_request(&self, args: &PullRequestArguments) -> Result<PullRequest>;

    /// Replace the title and body of an existing pull request
    async fn update_pull_request(
        &self,
        pr: &PullRequest,
        args: &PullRequestArguments,
    ) -> Result<PullRequest>;

    /// Post a comment on a pull request
    async fn add_pr_comment(&self, pr: &PullRequest, body: &str) -> Result<()>;

    /// Add labels to a pull request
    async fn add_labels(&self, pr: &PullRequest, labels: &[String]) -> Result<()>;

    /// Refresh merged/closed flags, head and last commit SHA in place
    async fn update_pull_request_status(&self, pr: &mut PullRequest) -> Result<()>;

    /// Ask the provider to merge the pull request
    async fn merge_pull_request(&self, pr: &PullRequest, message: &str) -> Result<()>;
}

/// Commit status lookups
#[async_trait]
pub trait CommitStatusService: Send + Sync {
    /// Combined status of the pull request's last commit
    async fn pull_request_last_commit_status(&self, pr: &PullRequest) -> Result<CommitState>;

    /// Individual status entries for a commit
    async fn list_commit_statuses(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Vec<CommitStatus>>;
}

/// Everything the promotion engine needs from a hosted git provider
pub trait PlatformService: RepositoryService + PullRequestService + CommitStatusService {
    /// The repository this service was created for
    fn config(&self) -> &PlatformConfig;
}
