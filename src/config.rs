//! Promotion settings stored in `~/.config/gitops-promote/config.toml`

use crate::error::{Error, Result};
use crate::types::DEFAULT_BASE_BRANCH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the user config dir
const CONFIG_DIR: &str = "gitops-promote";

/// Config filename
const CONFIG_FILE: &str = "config.toml";

/// Message used when the engine merges a promotion PR itself
pub const DEFAULT_MERGE_MESSAGE: &str = "jx promote automatically merged promotion PR";

/// Remote name the original repository is added under in a fork clone
pub const DEFAULT_UPSTREAM_REMOTE: &str = "upstream";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 60 * 60;

/// Settings for one promotion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoteConfig {
    /// Seconds between merge watcher ticks
    pub poll_interval_secs: u64,
    /// Seconds to wait for the PR to merge
    pub timeout_secs: u64,
    /// Merge the PR when CI passes and no tide bot is present
    pub auto_merge: bool,
    /// Commit message for merges the engine performs
    pub merge_message: String,
    /// Base branch when a request leaves it empty
    pub default_base: String,
    /// Name of the remote pointing at the original repository
    pub upstream_remote: String,
    /// Directory clones are placed under when a request has a relative path
    pub clone_root: Option<PathBuf>,
    /// Committer name override
    pub git_user_name: Option<String>,
    /// Committer email override
    pub git_user_email: Option<String>,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auto_merge: true,
            merge_message: DEFAULT_MERGE_MESSAGE.to_string(),
            default_base: DEFAULT_BASE_BRANCH.to_string(),
            upstream_remote: DEFAULT_UPSTREAM_REMOTE.to_string(),
            clone_root: None,
            git_user_name: None,
            git_user_email: None,
        }
    }
}

impl PromoteConfig {
    /// Interval between watcher ticks
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// How long to wait for a merge
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve a request directory against `clone_root`
    pub fn resolve_dir(&self, dir: &Path) -> PathBuf {
        match &self.clone_root {
            Some(root) if dir.is_relative() => root.join(dir),
            _ => dir.to_path_buf(),
        }
    }

    /// Committer identity, when both name and email are set
    pub fn git_identity(&self) -> Option<(&str, &str)> {
        Some((self.git_user_name.as_deref()?, self.git_user_email.as_deref()?))
    }
}

/// Default config location, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load config from `path`.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PromoteConfig> {
    if !path.exists() {
        return Ok(PromoteConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let config: PromoteConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    if config.poll_interval_secs == 0 {
        return Err(Error::Config(format!(
            "{}: poll_interval_secs must be greater than zero",
            path.display()
        )));
    }

    Ok(config)
}

/// Load config from the default location
pub fn load_default_config() -> Result<PromoteConfig> {
    default_config_path().map_or_else(|| Ok(PromoteConfig::default()), |path| load_config(&path))
}
