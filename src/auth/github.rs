//! GitHub token discovery

use super::{AuthSource, token_from_cli, token_from_env};
use crate::error::{Error, Result};

/// Variables checked for a GitHub token, in order
const TOKEN_VARS: &[&str] = &["GH_TOKEN", "GITHUB_TOKEN"];

/// Resolved GitHub credentials
#[derive(Debug, Clone)]
pub struct GitHubAuthConfig {
    /// API token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
}

/// Find a GitHub token for `host` (None for github.com)
pub async fn get_github_auth(host: Option<&str>) -> Result<GitHubAuthConfig> {
    get_github_auth_with(host, |key| std::env::var(key).ok()).await
}

/// Like [`get_github_auth`], reading environment variables through `env`
pub async fn get_github_auth_with(
    host: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<GitHubAuthConfig> {
    if let Some(token) = token_from_env(TOKEN_VARS, &env) {
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::EnvVar,
        });
    }

    let mut args = vec!["auth", "token"];
    if let Some(host) = host {
        args.extend(["--hostname", host]);
    }
    if let Some(token) = token_from_cli("gh", &args).await {
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::Cli,
        });
    }

    Err(Error::Auth(
        "no GitHub token found; set GH_TOKEN or GITHUB_TOKEN, or run `gh auth login`".to_string(),
    ))
}
