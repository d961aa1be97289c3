//! GitLab platform service implementation

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
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    token: String,
    api_base: String,
    config: PlatformConfig,
}

#[derive(Deserialize)]
struct User {
    username: String,
}

#[derive(Deserialize)]
struct Namespace {
    full_path: String,
}

#[derive(Deserialize)]
struct Project {
    id: u64,
    path: String,
    namespace: Namespace,
    http_url_to_repo: String,
    web_url: String,
    forked_from_project: Option<serde_json::Value>,
}

impl From<Project> for Repository {
    fn from(project: Project) -> Self {
        Self {
            owner: project.namespace.full_path,
            name: project.path,
            clone_url: project.http_url_to_repo,
            html_url: project.web_url,
            fork: project.forked_from_project.is_some(),
        }
    }
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
    title: String,
    description: Option<String>,
    state: String, // "opened", "closed", "merged", "locked"
    author: Option<User>,
    source_branch: String,
    sha: Option<String>,
}

impl MergeRequest {
    fn into_pull_request(self, owner: &str, repo: &str) -> PullRequest {
        let merged = self.state == "merged";
        PullRequest {
            number: self.iid,
            url: self.web_url,
            owner: owner.to_string(),
            repo: repo.to_string(),
            title: self.title,
            body: self.description,
            author: self.author.map(|a| a.username),
            head_ref: Some(self.source_branch).filter(|b| !b.is_empty()),
            last_commit_sha: self.sha.filter(|sha| !sha.is_empty()),
            merged,
            closed: merged || self.state == "closed",
        }
    }
}

#[derive(Deserialize)]
struct StatusEntry {
    status: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct MergeResponse {
    state: String,
}

#[derive(Serialize)]
struct CreateMrPayload<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_project_id: Option<u64>,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page number from GitLab's `x-next-page` header; empty on the last page
fn next_page(response: &Response) -> Option<u32> {
    response
        .headers()
        .get("x-next-page")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Fold individual job statuses into one state for the commit
fn combine_states(states: &[CommitState]) -> CommitState {
    if let Some(failing) = states.iter().find(|s| s.is_failing()) {
        return failing.clone();
    }
    if states.is_empty() || states.iter().any(|s| *s != CommitState::Success) {
        return CommitState::Pending;
    }
    CommitState::Success
}

impl GitLabService {
    /// Create a new GitLab service
    pub fn new(token: String, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let api_base = format!(
            "https://{}/api/v4",
            host.as_deref().unwrap_or("gitlab.com")
        );
        Self::with_api_base(token, owner, repo, host, &api_base)
    }

    /// Create a service talking to an explicit API root
    pub fn with_api_base(
        token: String,
        owner: String,
        repo: String,
        host: Option<String>,
        api_base: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::GitLabApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
            config: PlatformConfig {
                platform: Platform::GitLab,
                owner,
                repo,
                host: host.filter(|h| h != "gitlab.com"),
            },
        })
    }

    fn encoded_project(owner: &str, name: &str) -> String {
        urlencoding::encode(&format!("{owner}/{name}")).into_owned()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .header("PRIVATE-TOKEN", &self.token)
    }

    fn mr_path(pr: &PullRequest) -> String {
        format!(
            "/projects/{}/merge_requests/{}",
            Self::encoded_project(&pr.owner, &pr.repo),
            pr.number
        )
    }

    fn checked(response: Response) -> Result<Response> {
        response
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))
    }

    async fn project(&self, owner: &str, name: &str) -> Result<Option<Project>> {
        let response = self
            .request(
                Method::GET,
                &format!("/projects/{}", Self::encoded_project(owner, name)),
            )
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::checked(response)?.json().await?))
    }

    async fn statuses(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<StatusEntry>> {
        let url = format!(
            "/projects/{}/repository/commits/{sha}/statuses",
            Self::encoded_project(owner, repo)
        );
        Ok(Self::checked(self.request(Method::GET, &url).send().await?)?
            .json()
            .await?)
    }
}

#[async_trait]
impl RepositoryService for GitLabService {
    async fn current_username(&self) -> Result<String> {
        debug!("resolving current user");
        let user: User = Self::checked(self.request(Method::GET, "/user").send().await?)?
            .json()
            .await?;
        Ok(user.username)
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        debug!(owner, name, "getting project");
        Ok(self.project(owner, name).await?.map(Into::into))
    }

    fn forking(&self) -> Capability<&dyn ForkService> {
        Capability::Available(self)
    }
}

#[async_trait]
impl ForkService for GitLabService {
    async fn fork_repository(
        &self,
        owner: &str,
        name: &str,
        organisation: &str,
    ) -> Result<Repository> {
        debug!(owner, name, organisation, "forking project");
        let payload = if organisation.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::json!({ "namespace_path": organisation })
        };

        let project: Project = Self::checked(
            self.request(
                Method::POST,
                &format!("/projects/{}/fork", Self::encoded_project(owner, name)),
            )
            .json(&payload)
            .send()
            .await?,
        )?
        .json()
        .await?;

        debug!(fork = %project.namespace.full_path, "forked project");
        Ok(project.into())
    }
}

#[async_trait]
impl PullRequestService for GitLabService {
    async fn list_open_pull_requests(&self, owner: &str, name: &str) -> Result<Vec<PullRequest>> {
        debug!(owner, name, "listing open MRs");
        let url = format!(
            "/projects/{}/merge_requests",
            Self::encoded_project(owner, name)
        );

        let mut mrs: Vec<MergeRequest> = Vec::new();
        let mut page: u32 = 1;
        loop {
            let response = Self::checked(
                self.request(Method::GET, &url)
                    .query(&[("state", "opened"), ("per_page", "100")])
                    .query(&[("page", page)])
                    .send()
                    .await?,
            )?;
            let next = next_page(&response).filter(|&next| next > page);
            mrs.extend(response.json::<Vec<MergeRequest>>().await?);
            match next {
                Some(next) => page = next,
                None => break,
            }
        }

        let result: Vec<PullRequest> = mrs
            .into_iter()
            .map(|mr| mr.into_pull_request(owner, name))
            .collect();
        debug!(owner, name, count = result.len(), "listed open MRs");
        Ok(result)
    }

    async fn create_pull_request(&self, args: &PullRequestArguments) -> Result<PullRequest> {
        debug!(head = %args.head, base = %args.base, "creating MR");

        // A head of `user:branch` from another namespace means the MR is
        // opened from the user's fork against the upstream project
        let (source_project, source_branch, target_project_id) = match args.head.split_once(':')
        {
            Some((head_owner, branch)) if head_owner != args.owner => {
                let upstream = self
                    .project(&args.owner, &args.repo)
                    .await?
                    .ok_or_else(|| {
                        Error::GitLabApi(format!("project {}/{} not found", args.owner, args.repo))
                    })?;
                (
                    Self::encoded_project(head_owner, &args.repo),
                    branch,
                    Some(upstream.id),
                )
            }
            Some((_, branch)) => (Self::encoded_project(&args.owner, &args.repo), branch, None),
            None => (
                Self::encoded_project(&args.owner, &args.repo),
                args.head.as_str(),
                None,
            ),
        };

        let payload = CreateMrPayload {
            source_branch,
            target_branch: &args.base,
            title: &args.title,
            description: &args.body,
            target_project_id,
        };

        let mr: MergeRequest = Self::checked(
            self.request(
                Method::POST,
                &format!("/projects/{source_project}/merge_requests"),
            )
            .json(&payload)
            .send()
            .await?,
        )?
        .json()
        .await?;

        let pr = mr.into_pull_request(&args.owner, &args.repo);
        debug!(mr_iid = pr.number, "created MR");
        Ok(pr)
    }

    async fn update_pull_request(
        &self,
        pr: &PullRequest,
        args: &PullRequestArguments,
    ) -> Result<PullRequest> {
        debug!(mr_iid = pr.number, "updating MR");
        let mr: MergeRequest = Self::checked(
            self.request(Method::PUT, &Self::mr_path(pr))
                .json(&serde_json::json!({
                    "title": args.title,
                    "description": args.body,
                }))
                .send()
                .await?,
        )?
        .json()
        .await?;

        Ok(mr.into_pull_request(&pr.owner, &pr.repo))
    }

    async fn add_pr_comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        debug!(mr_iid = pr.number, "creating MR comment");
        Self::checked(
            self.request(Method::POST, &format!("{}/notes", Self::mr_path(pr)))
                .json(&serde_json::json!({ "body": body }))
                .send()
                .await?,
        )?;
        Ok(())
    }

    async fn add_labels(&self, pr: &PullRequest, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        debug!(mr_iid = pr.number, ?labels, "adding labels");
        Self::checked(
            self.request(Method::PUT, &Self::mr_path(pr))
                .json(&serde_json::json!({ "add_labels": labels.join(",") }))
                .send()
                .await?,
        )?;
        Ok(())
    }

    async fn update_pull_request_status(&self, pr: &mut PullRequest) -> Result<()> {
        debug!(mr_iid = pr.number, "refreshing MR status");
        let mr: MergeRequest =
            Self::checked(self.request(Method::GET, &Self::mr_path(pr)).send().await?)?
                .json()
                .await?;

        let refreshed = mr.into_pull_request(&pr.owner, &pr.repo);
        pr.merged = refreshed.merged;
        pr.closed = refreshed.closed;
        if refreshed.last_commit_sha.is_some() {
            pr.last_commit_sha = refreshed.last_commit_sha;
        }
        pr.title = refreshed.title;
        pr.body = refreshed.body;
        debug!(mr_iid = pr.number, merged = pr.merged, closed = pr.closed, "refreshed MR status");
        Ok(())
    }

    async fn merge_pull_request(&self, pr: &PullRequest, message: &str) -> Result<()> {
        debug!(mr_iid = pr.number, "merging MR");
        let response: MergeResponse = Self::checked(
            self.request(Method::PUT, &format!("{}/merge", Self::mr_path(pr)))
                .json(&serde_json::json!({ "merge_commit_message": message }))
                .send()
                .await?,
        )
        .map_err(|e| Error::GitLabApi(format!("Merge failed: {e}")))?
        .json()
        .await?;

        if response.state != "merged" {
            return Err(Error::GitLabApi(format!(
                "Merge failed: merge request is {}",
                response.state
            )));
        }
        debug!(mr_iid = pr.number, "merge complete");
        Ok(())
    }
}

#[async_trait]
impl CommitStatusService for GitLabService {
    async fn pull_request_last_commit_status(&self, pr: &PullRequest) -> Result<CommitState> {
        let sha = pr
            .last_commit_sha
            .as_deref()
            .ok_or_else(|| Error::GitLabApi(format!("merge request {} has no head commit", pr.url)))?;

        let states: Vec<CommitState> = self
            .statuses(&pr.owner, &pr.repo, sha)
            .await?
            .iter()
            .map(|entry| CommitState::parse(&entry.status))
            .collect();

        let state = combine_states(&states);
        debug!(mr_iid = pr.number, %state, "commit status result");
        Ok(state)
    }

    async fn list_commit_statuses(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Vec<CommitStatus>> {
        debug!(owner, repo, sha, "listing commit statuses");
        Ok(self
            .statuses(owner, repo, sha)
            .await?
            .into_iter()
            .map(|entry| CommitStatus {
                state: CommitState::parse(&entry.status),
                context: entry.name,
            })
            .collect())
    }
}

impl PlatformService for GitLabService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
