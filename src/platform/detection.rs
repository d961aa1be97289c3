//! Platform detection from repository URLs

use crate::error::{Error, Result};
use crate::types::{Platform, PlatformConfig};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Environment variable naming a GitHub Enterprise host
const GH_HOST_VAR: &str = "GH_HOST";

/// Environment variable naming a self-hosted GitLab host
const GITLAB_HOST_VAR: &str = "GITLAB_HOST";

/// `git@host:owner/repo.git` style remotes
static SCP_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.-]+@)?(?P<host>[\w.-]+):(?P<path>[^/].*)$").expect("valid regex")
});

/// Detect the platform of a repository URL using the process environment
pub fn detect_platform(url: &str) -> Option<Platform> {
    detect_platform_with(url, |key| std::env::var(key).ok())
}

/// Detect the platform of a repository URL, reading host overrides via `env`
pub fn detect_platform_with(url: &str, env: impl Fn(&str) -> Option<String>) -> Option<Platform> {
    let (host, _) = split_url(url)?;
    platform_for_host(&host, &env)
}

/// Parse a repository URL into a [`PlatformConfig`] using the process environment
pub fn parse_repo_info(url: &str) -> Result<PlatformConfig> {
    parse_repo_info_with(url, |key| std::env::var(key).ok())
}

/// Parse a repository URL into a [`PlatformConfig`], reading host overrides via `env`
pub fn parse_repo_info_with(
    url: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PlatformConfig> {
    let (host, path) = split_url(url).ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
    let platform = platform_for_host(&host, &env).ok_or_else(|| {
        Error::InvalidUrl(format!("{url} is not a GitHub or GitLab repository"))
    })?;

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path
        .rsplit_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| Error::InvalidUrl(format!("{url} has no owner/repository path")))?;

    // GitHub has no nested namespaces
    if platform == Platform::GitHub && owner.contains('/') {
        return Err(Error::InvalidUrl(format!(
            "{url} has too many path segments for GitHub"
        )));
    }

    let host = match (platform, host.as_str()) {
        (Platform::GitHub, "github.com") | (Platform::GitLab, "gitlab.com") => None,
        _ => Some(host),
    };

    Ok(PlatformConfig {
        platform,
        owner: owner.to_string(),
        repo: repo.to_string(),
        host,
    })
}

/// Split a URL into host and path, accepting URLs and SCP-style remotes
fn split_url(url: &str) -> Option<(String, String)> {
    let url = url.trim().trim_end_matches('/');

    // `host:path` without a user parses as a URL with no host, so fall
    // through to the SCP form in that case
    if let Ok(parsed) = Url::parse(url)
        && let Some(host) = parsed.host_str()
    {
        return Some((host.to_string(), parsed.path().to_string()));
    }

    let caps = SCP_URL.captures(url)?;
    Some((caps["host"].to_string(), caps["path"].to_string()))
}

fn platform_for_host(host: &str, env: &impl Fn(&str) -> Option<String>) -> Option<Platform> {
    let matches_var =
        |var: &str| env(var).is_some_and(|h| !h.is_empty() && h.eq_ignore_ascii_case(host));

    if host == "github.com" || matches_var(GH_HOST_VAR) {
        Some(Platform::GitHub)
    } else if host == "gitlab.com" || matches_var(GITLAB_HOST_VAR) || host.starts_with("gitlab.")
    {
        Some(Platform::GitLab)
    } else {
        None
    }
}
