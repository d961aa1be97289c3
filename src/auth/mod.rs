//! Authentication for GitHub and GitLab
//!
//! Supports CLI-based auth (gh, glab) and environment variables.

mod github;
mod gitlab;

pub use github::{GitHubAuthConfig, get_github_auth, get_github_auth_with};
pub use gitlab::{GitLabAuthConfig, get_gitlab_auth, get_gitlab_auth_with};

use tokio::process::Command;
use tracing::debug;

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (gh or glab)
    Cli,
    /// Token from environment variable
    EnvVar,
}

/// First non-empty value among `vars`
fn token_from_env(vars: &[&str], env: &impl Fn(&str) -> Option<String>) -> Option<String> {
    vars.iter()
        .filter_map(|var| env(*var))
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
}

/// Ask a provider CLI for its token; `None` if the CLI is missing or logged out
async fn token_from_cli(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().await.ok()?;
    if !output.status.success() {
        debug!(program, "token lookup via CLI failed");
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}
