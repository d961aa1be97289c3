//! Create-or-update of the promotion pull request

use super::ChangeApplier;
use crate::error::{Error, ErrorKind, Result, ResultExt};
use crate::git::{GitOps, ORIGIN, convert_to_valid_branch_name};
use crate::platform::{Capability, PlatformService, parse_repo_info};
use crate::types::{
    PullRequest, PullRequestAction, PullRequestArguments, PullRequestInfo, PullRequestRequest,
    Repository,
};
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix `git branch -a` puts in front of branches on `origin`
pub const REMOTE_BRANCH_PREFIX: &str = "remotes/origin/";

/// Drives one change from a working copy to an open pull request
pub struct PullRequestCoordinator<'a> {
    platform: &'a dyn PlatformService,
    git: &'a dyn GitOps,
    upstream_remote: &'a str,
}

/// Where the change is pushed and where the PR is opened
struct Target {
    owner: String,
    name: String,
    username: String,
    push_repo: Repository,
}

impl<'a> PullRequestCoordinator<'a> {
    /// Create a coordinator that adds the original repository as `upstream_remote`
    pub fn new(
        platform: &'a dyn PlatformService,
        git: &'a dyn GitOps,
        upstream_remote: &'a str,
    ) -> Self {
        Self {
            platform,
            git,
            upstream_remote,
        }
    }

    /// Apply a change and open a pull request for it, reusing an open pull
    /// request with the same title by the same author.
    ///
    /// Returns `Ok(None)` when the applier left the working copy unchanged.
    pub async fn create_or_update(
        &self,
        request: &PullRequestRequest,
        applier: &dyn ChangeApplier,
    ) -> Result<Option<PullRequestInfo>> {
        let target = self.resolve_target(&request.git_url).await?;
        let dir = request.dir.as_path();

        self.prepare_checkout(&target, request, dir).await?;
        let branch = self.create_branch(dir, &request.branch_name_seed).await?;

        applier
            .apply(dir)
            .await
            .step(ErrorKind::Apply, || format!("applying changes in {}", dir.display()))?;

        self.git
            .add(dir, &["-A"])
            .await
            .step(ErrorKind::Push, || format!("staging changes in {}", dir.display()))?;
        let changed = self
            .git
            .has_changes(dir)
            .await
            .step(ErrorKind::Push, || format!("checking for changes in {}", dir.display()))?;
        if !changed {
            warn!(dir = %dir.display(), "no changes made to the repository, skipping pull request");
            return Ok(None);
        }

        self.git
            .commit_dir(dir, &request.title)
            .await
            .step(ErrorKind::Push, || format!("committing in {}", dir.display()))?;

        if let Some(existing) = self.find_existing(&target, &request.title).await? {
            if let Some(remote_branch) = existing.head_branch() {
                let remote_branch = remote_branch.to_string();
                return self
                    .update_existing(&target, request, dir, &branch, existing, &remote_branch)
                    .await
                    .map(Some);
            }
            warn!(
                url = %existing.url,
                "pull request has no head ref, creating a new pull request instead"
            );
        }

        self.create_new(&target, request, dir, &branch).await.map(Some)
    }

    /// Resolve the acting user and the repository changes are pushed to
    async fn resolve_target(&self, git_url: &str) -> Result<Target> {
        let info = parse_repo_info(git_url)
            .step(ErrorKind::Setup, || format!("parsing repository URL {git_url}"))?;
        let (owner, name) = (info.owner, info.repo);

        let username = self
            .platform
            .current_username()
            .await
            .step(ErrorKind::Setup, || "resolving the current user".to_string())?;
        if username.is_empty() {
            return Err(Error::MissingUsername);
        }

        let existing = self
            .platform
            .get_repository(&username, &name)
            .await
            .step(ErrorKind::Setup, || {
                format!("looking up repository {username}/{name}")
            })?;

        let push_repo = match existing {
            Some(repo) => repo,
            None if username != owner => self.fork_or_original(&owner, &name).await?,
            None => {
                return Err(Error::RepositoryNotFound {
                    owner: username,
                    name,
                });
            }
        };
        debug!(user = %username, push_to = %push_repo.clone_url, "resolved target repository");

        Ok(Target {
            owner,
            name,
            username,
            push_repo,
        })
    }

    async fn fork_or_original(&self, owner: &str, name: &str) -> Result<Repository> {
        match self.platform.forking() {
            Capability::Available(forks) => {
                info!(owner, name, "forking repository");
                // empty organisation forces a personal fork
                forks
                    .fork_repository(owner, name, "")
                    .await
                    .step(ErrorKind::Setup, || format!("forking {owner}/{name}"))
            }
            Capability::Unsupported { reason } => {
                warn!(owner, name, reason, "forking unsupported, using the original repository");
                self.platform
                    .get_repository(owner, name)
                    .await
                    .step(ErrorKind::Setup, || {
                        format!("looking up repository {owner}/{name}")
                    })?
                    .ok_or_else(|| Error::RepositoryNotFound {
                        owner: owner.to_string(),
                        name: name.to_string(),
                    })
            }
        }
    }

    /// Clone (or refresh an existing clone) and bring the base branch up to date
    async fn prepare_checkout(
        &self,
        target: &Target,
        request: &PullRequestRequest,
        dir: &Path,
    ) -> Result<()> {
        let clone_url = &target.push_repo.clone_url;
        let base = &request.base;

        if dir.join(".git").exists() {
            debug!(dir = %dir.display(), "reusing existing clone");
            self.git
                .set_remote_url(dir, ORIGIN, clone_url)
                .await
                .step(ErrorKind::Setup, || format!("setting {ORIGIN} to {clone_url}"))?;
            self.git
                .fetch(dir, ORIGIN)
                .await
                .step(ErrorKind::Setup, || format!("fetching {clone_url}"))?;
            // an earlier run may have stopped with the tree half changed
            self.git
                .stash(dir)
                .await
                .step(ErrorKind::Setup, || format!("stashing changes in {}", dir.display()))?;
        } else {
            self.git
                .clone_repo(clone_url, dir)
                .await
                .step(ErrorKind::Setup, || {
                    format!("cloning {clone_url} into {}", dir.display())
                })?;
        }

        self.git
            .checkout(dir, base)
            .await
            .step(ErrorKind::Setup, || format!("checking out {base}"))?;

        let upstream = self.upstream_remote;
        self.git
            .set_remote_url(dir, upstream, &request.git_url)
            .await
            .step(ErrorKind::Setup, || {
                format!("adding remote {upstream} for {}", request.git_url)
            })?;
        self.git
            .pull_upstream(dir, upstream, base)
            .await
            .step(ErrorKind::Setup, || {
                format!("pulling {base} from {}", request.git_url)
            })?;
        Ok(())
    }

    /// Create and check out a branch whose name no remote branch uses yet.
    ///
    /// A local-only branch of the same name was never pushed and is reset.
    async fn create_branch(&self, dir: &Path, seed: &str) -> Result<String> {
        let mut branch = convert_to_valid_branch_name(seed);
        let remote_branches = self
            .git
            .remote_branch_names(dir, REMOTE_BRANCH_PREFIX)
            .await
            .step(ErrorKind::Setup, || {
                format!("listing remote branches in {}", dir.display())
            })?;

        if remote_branches.iter().any(|name| *name == branch) {
            branch = format!("{branch}-{}", Uuid::new_v4());
            debug!(%branch, "branch name taken, using a unique name");
        }

        self.git
            .create_branch(dir, &branch)
            .await
            .step(ErrorKind::Setup, || format!("creating branch {branch}"))?;
        self.git
            .checkout(dir, &branch)
            .await
            .step(ErrorKind::Setup, || format!("checking out branch {branch}"))?;
        Ok(branch)
    }

    async fn find_existing(&self, target: &Target, title: &str) -> Result<Option<PullRequest>> {
        let open = self
            .platform
            .list_open_pull_requests(&target.owner, &target.name)
            .await
            .step(ErrorKind::PullRequest, || {
                format!("listing open pull requests on {}/{}", target.owner, target.name)
            })?;

        Ok(open.into_iter().find(|pr| {
            pr.title == title && pr.author.as_deref() == Some(target.username.as_str())
        }))
    }

    fn arguments(
        target: &Target,
        request: &PullRequestRequest,
        branch: &str,
    ) -> PullRequestArguments {
        PullRequestArguments {
            owner: target.owner.clone(),
            repo: target.name.clone(),
            head: format!("{}:{branch}", target.username),
            base: request.base.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            labels: request.labels.clone(),
        }
    }

    async fn update_existing(
        &self,
        target: &Target,
        request: &PullRequestRequest,
        dir: &Path,
        branch: &str,
        existing: PullRequest,
        remote_branch: &str,
    ) -> Result<PullRequestInfo> {
        self.git
            .force_push_branch(dir, branch, remote_branch)
            .await
            .step(ErrorKind::Push, || {
                format!("force pushing {branch} to {remote_branch}")
            })?;

        let args = Self::arguments(target, request, remote_branch);
        let updated = self
            .platform
            .update_pull_request(&existing, &args)
            .await
            .step(ErrorKind::PullRequest, || {
                format!("updating pull request {}", existing.url)
            })?;

        let comment = format!(
            "Replaced the changes on `{remote_branch}` with a new commit for: {}",
            request.title
        );
        self.platform
            .add_pr_comment(&updated, &comment)
            .await
            .step(ErrorKind::PullRequest, || {
                format!("commenting on pull request {}", updated.url)
            })?;

        info!(url = %updated.url, "updated pull request");
        Ok(PullRequestInfo {
            pull_request: updated,
            arguments: args,
            action: PullRequestAction::Updated,
        })
    }

    async fn create_new(
        &self,
        target: &Target,
        request: &PullRequestRequest,
        dir: &Path,
        branch: &str,
    ) -> Result<PullRequestInfo> {
        self.git
            .push(dir)
            .await
            .step(ErrorKind::Push, || format!("pushing branch {branch}"))?;

        let args = Self::arguments(target, request, branch);
        let pr = self
            .platform
            .create_pull_request(&args)
            .await
            .step(ErrorKind::PullRequest, || {
                format!("creating pull request {args}")
            })?;

        if !args.labels.is_empty() {
            self.platform
                .add_labels(&pr, &args.labels)
                .await
                .step(ErrorKind::PullRequest, || {
                    format!("labelling pull request {}", pr.url)
                })?;
        }

        info!(url = %pr.url, "created pull request");
        Ok(PullRequestInfo {
            pull_request: pr,
            arguments: args,
            action: PullRequestAction::Created,
        })
    }
}
