//! GitLab token discovery

use super::{AuthSource, token_from_cli, token_from_env};
use crate::error::{Error, Result};

/// Variables checked for a GitLab token, in order
const TOKEN_VARS: &[&str] = &["GITLAB_TOKEN", "GL_TOKEN"];

/// Resolved GitLab credentials
#[derive(Debug, Clone)]
pub struct GitLabAuthConfig {
    /// API token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
}

/// Find a GitLab token for `host` (None for gitlab.com)
pub async fn get_gitlab_auth(host: Option<&str>) -> Result<GitLabAuthConfig> {
    get_gitlab_auth_with(host, |key| std::env::var(key).ok()).await
}

/// Like [`get_gitlab_auth`], reading environment variables through `env`
pub async fn get_gitlab_auth_with(
    host: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<GitLabAuthConfig> {
    if let Some(token) = token_from_env(TOKEN_VARS, &env) {
        return Ok(GitLabAuthConfig {
            token,
            source: AuthSource::EnvVar,
        });
    }

    let mut args = vec!["auth", "token"];
    if let Some(host) = host {
        args.extend(["--hostname", host]);
    }
    if let Some(token) = token_from_cli("glab", &args).await {
        return Ok(GitLabAuthConfig {
            token,
            source: AuthSource::Cli,
        });
    }

    Err(Error::Auth(
        "no GitLab token found; set GITLAB_TOKEN, or run `glab auth login`".to_string(),
    ))
}
