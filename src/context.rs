//! Everything a promotion needs, passed explicitly

use crate::config::PromoteConfig;
use crate::error::{ErrorKind, Result, ResultExt};
use crate::git::{GitCli, GitOps};
use crate::platform::{PlatformService, create_platform_service, parse_repo_info};
use crate::promote::{
    ChangeApplier, Clock, MergeWatcher, PullRequestCoordinator, SystemClock, WatchOptions,
};
use crate::types::{PullRequestInfo, PullRequestRequest};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Provider client, git driver, clock and settings for promotions
pub struct PromotionContext {
    platform: Arc<dyn PlatformService>,
    git: Arc<dyn GitOps>,
    clock: Arc<dyn Clock>,
    config: PromoteConfig,
}

impl PromotionContext {
    /// Build a context from explicit collaborators, using the system clock
    pub fn new(
        platform: Arc<dyn PlatformService>,
        git: Arc<dyn GitOps>,
        config: PromoteConfig,
    ) -> Self {
        Self {
            platform,
            git,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Authenticate against the provider hosting `git_url` and drive git
    /// through the `git` executable
    pub async fn connect(git_url: &str, config: PromoteConfig) -> Result<Self> {
        let repo = parse_repo_info(git_url)
            .step(ErrorKind::Setup, || format!("parsing repository URL {git_url}"))?;
        debug!(platform = %repo.platform, owner = %repo.owner, repo = %repo.repo, "connecting");
        let platform = create_platform_service(&repo)
            .await
            .step(ErrorKind::Setup, || format!("connecting to {}", repo.platform))?;

        let git = match config.git_identity() {
            Some((name, email)) => GitCli::new().with_identity(name, email),
            None => GitCli::new(),
        };

        Ok(Self::new(Arc::from(platform), Arc::new(git), config))
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Settings in use
    pub const fn config(&self) -> &PromoteConfig {
        &self.config
    }

    /// Provider client in use
    pub fn platform(&self) -> &dyn PlatformService {
        self.platform.as_ref()
    }

    /// A request using the configured base branch and clone root
    pub fn request(
        &self,
        dir: &Path,
        git_url: &str,
        branch_name_seed: &str,
        title: &str,
        body: &str,
    ) -> PullRequestRequest {
        PullRequestRequest::new(
            self.config.resolve_dir(dir),
            git_url,
            branch_name_seed,
            title,
            body,
        )
        .with_base(self.config.default_base.as_str())
    }

    /// Coordinator borrowing this context's collaborators
    pub fn coordinator(&self) -> PullRequestCoordinator<'_> {
        PullRequestCoordinator::new(
            self.platform.as_ref(),
            self.git.as_ref(),
            &self.config.upstream_remote,
        )
    }

    /// Watcher configured from this context's settings
    pub fn watcher(&self) -> MergeWatcher<'_> {
        MergeWatcher::new(
            self.platform.as_ref(),
            self.clock.as_ref(),
            WatchOptions::from(&self.config),
        )
    }

    /// Open or update the pull request for a change, then wait for it to merge.
    ///
    /// Returns `Ok(None)` when the change was a no-op.
    pub async fn promote(
        &self,
        request: &PullRequestRequest,
        applier: &dyn ChangeApplier,
    ) -> Result<Option<PullRequestInfo>> {
        let mut info = self.coordinator().create_or_update(request, applier).await?;
        self.watcher()
            .wait(info.as_mut().map(|info| &mut info.pull_request))
            .await?;
        Ok(info)
    }
}
