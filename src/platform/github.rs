//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::{
    Capability, CommitStatusService, ForkService, PlatformService, PullRequestService,
    RepositoryService,
};
use crate::types::{
    CommitState, CommitStatus, Platform, PlatformConfig, PullRequest, PullRequestArguments,
    Repository,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Public GitHub API root
const GITHUB_API: &str = "https://api.github.com";

#[derive(Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    name: String,
    owner: RepoOwner,
    clone_url: String,
    html_url: String,
    #[serde(default)]
    fork: bool,
}

impl From<RepoResponse> for Repository {
    fn from(repo: RepoResponse) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            clone_url: repo.clone_url,
            html_url: repo.html_url,
            fork: repo.fork,
        }
    }
}

#[derive(Deserialize)]
struct CombinedStatus {
    state: String,
    total_count: u32,
}

#[derive(Deserialize)]
struct StatusEntry {
    state: String,
    #[serde(default)]
    context: String,
}

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    /// Token for raw HTTP requests (repositories, forks, statuses)
    token: String,
    /// HTTP client for raw requests
    http_client: Client,
    /// API root for raw requests, without a trailing slash
    api_base: String,
}

impl GitHubService {
    /// Create a new GitHub service for github.com or an Enterprise `host`
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let api_base = host
            .as_ref()
            .map_or_else(|| GITHUB_API.to_string(), |h| format!("https://{h}/api/v3"));
        Self::with_api_base(token, owner, repo, host, &api_base)
    }

    /// Create a service talking to an explicit API root
    pub fn with_api_base(
        token: &str,
        owner: String,
        repo: String,
        host: Option<String>,
        api_base: &str,
    ) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/').to_string();
        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if api_base != GITHUB_API {
            builder = builder
                .base_uri(api_base.as_str())
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("gitops-promote")
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: PlatformConfig {
                platform: Platform::GitHub,
                owner,
                repo,
                host,
            },
            token: token.to_string(),
            http_client,
            api_base,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.api_base))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn require_sha(pr: &PullRequest) -> Result<&str> {
        pr.last_commit_sha
            .as_deref()
            .filter(|sha| !sha.is_empty())
            .ok_or_else(|| Error::GitHubApi(format!("pull request {} has no head commit", pr.url)))
    }
}

/// Helper to convert octocrab PR to our `PullRequest` type
fn pr_from_octocrab(
    pr: &octocrab::models::pulls::PullRequest,
    owner: &str,
    repo: &str,
) -> PullRequest {
    let merged = pr.merged_at.is_some() || pr.merged.unwrap_or(false);
    let closed = merged
        || pr.closed_at.is_some()
        || matches!(pr.state, Some(octocrab::models::IssueState::Closed));

    PullRequest {
        number: pr.number,
        url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        owner: owner.to_string(),
        repo: repo.to_string(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        body: pr.body.clone(),
        author: pr.user.as_ref().map(|u| u.login.clone()),
        head_ref: pr
            .head
            .label
            .clone()
            .or_else(|| Some(pr.head.ref_field.clone()))
            .filter(|head| !head.is_empty()),
        last_commit_sha: Some(pr.head.sha.clone()).filter(|sha| !sha.is_empty()),
        merged,
        closed,
    }
}

#[async_trait]
impl RepositoryService for GitHubService {
    async fn current_username(&self) -> Result<String> {
        debug!("resolving current user");
        let user = self.client.current().user().await?;
        debug!(login = %user.login, "resolved current user");
        Ok(user.login)
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        debug!(owner, name, "getting repository");
        let response = self
            .request(Method::GET, &format!("/repos/{owner}/{name}"))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch repository: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(owner, name, "repository not found");
            return Ok(None);
        }

        let repo: RepoResponse = response
            .error_for_status()
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .json()
            .await?;
        Ok(Some(repo.into()))
    }

    fn forking(&self) -> Capability<&dyn ForkService> {
        Capability::Available(self)
    }
}

#[async_trait]
impl ForkService for GitHubService {
    async fn fork_repository(
        &self,
        owner: &str,
        name: &str,
        organisation: &str,
    ) -> Result<Repository> {
        debug!(owner, name, organisation, "forking repository");
        let payload = if organisation.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::json!({ "organization": organisation })
        };

        let repo: RepoResponse = self
            .request(Method::POST, &format!("/repos/{owner}/{name}/forks"))
            .json(&payload)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitHubApi(format!("Fork failed: {e}")))?
            .json()
            .await?;

        debug!(fork_owner = %repo.owner.login, "forked repository");
        Ok(repo.into())
    }
}

#[async_trait]
impl PullRequestService for GitHubService {
    async fn list_open_pull_requests(&self, owner: &str, name: &str) -> Result<Vec<PullRequest>> {
        debug!(owner, name, "listing open PRs");
        let first = self
            .client
            .pulls(owner, name)
            .list()
            .state(octocrab::params::State::Open)
            .per_page(100)
            .send()
            .await?;
        let prs = self.client.all_pages(first).await?;

        let result: Vec<PullRequest> = prs
            .iter()
            .map(|pr| pr_from_octocrab(pr, owner, name))
            .collect();
        debug!(owner, name, count = result.len(), "listed open PRs");
        Ok(result)
    }

    async fn create_pull_request(&self, args: &PullRequestArguments) -> Result<PullRequest> {
        debug!(head = %args.head, base = %args.base, "creating PR");
        let pr = self
            .client
            .pulls(&args.owner, &args.repo)
            .create(&args.title, &args.head, &args.base)
            .body(&args.body)
            .send()
            .await?;

        let result = pr_from_octocrab(&pr, &args.owner, &args.repo);
        debug!(pr_number = result.number, "created PR");
        Ok(result)
    }

    async fn update_pull_request(
        &self,
        pr: &PullRequest,
        args: &PullRequestArguments,
    ) -> Result<PullRequest> {
        debug!(pr_number = pr.number, "updating PR");
        let updated = self
            .client
            .pulls(&pr.owner, &pr.repo)
            .update(pr.number)
            .title(&args.title)
            .body(&args.body)
            .send()
            .await?;

        debug!(pr_number = pr.number, "updated PR");
        Ok(pr_from_octocrab(&updated, &pr.owner, &pr.repo))
    }

    async fn add_pr_comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        debug!(pr_number = pr.number, "creating PR comment");
        self.client
            .issues(&pr.owner, &pr.repo)
            .create_comment(pr.number, body)
            .await?;
        debug!(pr_number = pr.number, "created PR comment");
        Ok(())
    }

    async fn add_labels(&self, pr: &PullRequest, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        debug!(pr_number = pr.number, ?labels, "adding labels");
        self.client
            .issues(&pr.owner, &pr.repo)
            .add_labels(pr.number, labels)
            .await?;
        Ok(())
    }

    async fn update_pull_request_status(&self, pr: &mut PullRequest) -> Result<()> {
        debug!(pr_number = pr.number, "refreshing PR status");
        let latest = self
            .client
            .pulls(&pr.owner, &pr.repo)
            .get(pr.number)
            .await?;

        let refreshed = pr_from_octocrab(&latest, &pr.owner, &pr.repo);
        pr.merged = refreshed.merged;
        pr.closed = refreshed.closed;
        if refreshed.last_commit_sha.is_some() {
            pr.last_commit_sha = refreshed.last_commit_sha;
        }
        if refreshed.head_ref.is_some() {
            pr.head_ref = refreshed.head_ref;
        }
        pr.title = refreshed.title;
        pr.body = refreshed.body;

        debug!(pr_number = pr.number, merged = pr.merged, closed = pr.closed, "refreshed PR status");
        Ok(())
    }

    async fn merge_pull_request(&self, pr: &PullRequest, message: &str) -> Result<()> {
        debug!(pr_number = pr.number, "merging PR");
        let result = self
            .client
            .pulls(&pr.owner, &pr.repo)
            .merge(pr.number)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        if !result.merged {
            return Err(Error::GitHubApi(format!(
                "Merge failed: {}",
                result.message.unwrap_or_else(|| "not merged".to_string())
            )));
        }

        debug!(pr_number = pr.number, sha = ?result.sha, "merge complete");
        Ok(())
    }
}

#[async_trait]
impl CommitStatusService for GitHubService {
    async fn pull_request_last_commit_status(&self, pr: &PullRequest) -> Result<CommitState> {
        let sha = Self::require_sha(pr)?;
        debug!(pr_number = pr.number, sha, "fetching combined commit status");

        let status: CombinedStatus = self
            .request(
                Method::GET,
                &format!("/repos/{}/{}/commits/{sha}/status", pr.owner, pr.repo),
            )
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch commit status: {e}")))?
            .json()
            .await?;

        debug!(state = %status.state, count = status.total_count, "commit status result");
        Ok(CommitState::parse(&status.state))
    }

    async fn list_commit_statuses(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Vec<CommitStatus>> {
        debug!(owner, repo, sha, "listing commit statuses");
        let entries: Vec<StatusEntry> = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{repo}/commits/{sha}/statuses"),
            )
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitHubApi(format!("Failed to list commit statuses: {e}")))?
            .json()
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| CommitStatus {
                state: CommitState::parse(&entry.state),
                context: entry.context,
            })
            .collect())
    }
}

impl PlatformService for GitHubService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
