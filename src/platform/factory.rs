//! Platform service construction

use crate::auth::{get_github_auth, get_gitlab_auth};
use crate::error::Result;
use crate::platform::{GitHubService, GitLabService, PlatformService};
use crate::types::{Platform, PlatformConfig};
use tracing::debug;

/// Create an authenticated platform service for the given repository
pub async fn create_platform_service(config: &PlatformConfig) -> Result<Box<dyn PlatformService>> {
    debug!(
        platform = %config.platform,
        owner = %config.owner,
        repo = %config.repo,
        "creating platform service"
    );
    match config.platform {
        Platform::GitHub => {
            let auth = get_github_auth(config.host.as_deref()).await?;
            debug!(source = ?auth.source, "using GitHub token");
            Ok(Box::new(GitHubService::new(
                &auth.token,
                config.owner.clone(),
                config.repo.clone(),
                config.host.clone(),
            )?))
        }
        Platform::GitLab => {
            let auth = get_gitlab_auth(config.host.as_deref()).await?;
            debug!(source = ?auth.source, "using GitLab token");
            Ok(Box::new(GitLabService::new(
                auth.token,
                config.owner.clone(),
                config.repo.clone(),
                config.host.clone(),
            )?))
        }
    }
}
