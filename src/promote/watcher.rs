//! Polling state machine that waits for a promotion pull request to merge

use crate::config::{DEFAULT_MERGE_MESSAGE, PromoteConfig};
use crate::error::{Error, ErrorKind, Result, ResultExt};
use crate::platform::PlatformService;
use crate::types::{CommitState, CommitStatus, PullRequest};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a watched pull request is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    /// There was nothing to watch
    NoPullRequest,
    /// Open; no commit status seen yet
    OpenPending,
    /// Open with a known, non-failing commit status
    OpenStatusKnown(CommitState),
    /// Merged
    Merged,
    /// Closed without merging
    ClosedUnmerged,
    /// CI reported `error` or `failure`
    StatusFailed(CommitState),
    /// The deadline passed
    TimedOut,
}

impl WatchState {
    /// Whether polling stops in this state
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::OpenPending | Self::OpenStatusKnown(_))
    }
}

/// Time source for the watcher
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by tokio's timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How the watcher polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Delay between ticks
    pub poll_interval: Duration,
    /// Give up after this long
    pub timeout: Duration,
    /// Merge when CI is green and no tide bot is handling it
    pub auto_merge: bool,
    /// Message for merges the watcher performs
    pub merge_message: String,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from(&PromoteConfig::default())
    }
}

impl From<&PromoteConfig> for WatchOptions {
    fn from(config: &PromoteConfig) -> Self {
        let merge_message = if config.merge_message.is_empty() {
            DEFAULT_MERGE_MESSAGE.to_string()
        } else {
            config.merge_message.clone()
        };
        Self {
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
            auto_merge: config.auto_merge,
            merge_message,
        }
    }
}

/// Waits for a pull request to reach a terminal state
pub struct MergeWatcher<'a> {
    platform: &'a dyn PlatformService,
    clock: &'a dyn Clock,
    options: WatchOptions,
    state: WatchState,
    merge_failures: u32,
}

impl<'a> MergeWatcher<'a> {
    /// Create a watcher
    pub fn new(
        platform: &'a dyn PlatformService,
        clock: &'a dyn Clock,
        options: WatchOptions,
    ) -> Self {
        Self {
            platform,
            clock,
            options,
            state: WatchState::OpenPending,
            merge_failures: 0,
        }
    }

    /// Last state reached
    pub const fn state(&self) -> &WatchState {
        &self.state
    }

    /// Merge attempts that failed during the current watch.
    ///
    /// Only the first one is logged as a warning.
    pub const fn merge_failures(&self) -> u32 {
        self.merge_failures
    }

    /// Poll until `pr` is merged, closed, failing or the deadline passes.
    ///
    /// `None` means nothing was opened and returns immediately.
    pub async fn wait(&mut self, pr: Option<&mut PullRequest>) -> Result<WatchState> {
        let Some(pr) = pr else {
            self.state = WatchState::NoPullRequest;
            return Ok(WatchState::NoPullRequest);
        };

        let timeout = self.options.timeout;
        // too far out to represent: poll until a terminal state
        let deadline = self.clock.now().checked_add(timeout);
        self.state = WatchState::OpenPending;
        self.merge_failures = 0;
        info!(url = %pr.url, ?timeout, "waiting for pull request to merge");

        loop {
            let state = self.poll_once(pr).await.step(ErrorKind::MergeStatus, || {
                format!("getting pull request status for {}", pr.url)
            })?;

            match state {
                WatchState::Merged => {
                    info!(url = %pr.url, "pull request merged");
                    return Ok(state);
                }
                WatchState::ClosedUnmerged => {
                    return Err(Error::PullRequestClosed {
                        url: pr.url.clone(),
                    });
                }
                WatchState::StatusFailed(status) => {
                    return Err(Error::CommitStatusFailed {
                        url: pr.url.clone(),
                        status: status.to_string(),
                        sha: pr.sha_display().to_string(),
                    });
                }
                _ => {}
            }

            if deadline.is_some_and(|deadline| self.clock.now() > deadline) {
                self.state = WatchState::TimedOut;
                return Err(Error::MergeTimeout {
                    url: pr.url.clone(),
                    waited: timeout,
                });
            }
            self.clock.sleep(self.options.poll_interval).await;
        }
    }

    /// One tick: refresh the pull request, inspect CI and maybe merge.
    ///
    /// A refresh failure is returned; a commit status failure only warns.
    pub async fn poll_once(&mut self, pr: &mut PullRequest) -> Result<WatchState> {
        self.platform.update_pull_request_status(pr).await?;

        let state = if pr.merged {
            WatchState::Merged
        } else if pr.is_closed() {
            WatchState::ClosedUnmerged
        } else {
            match self.platform.pull_request_last_commit_status(pr).await {
                Err(e) => {
                    warn!(url = %pr.url, error = %e, "failed to query pull request last commit status");
                    WatchState::OpenPending
                }
                Ok(status) if status.is_failing() => WatchState::StatusFailed(status),
                Ok(status) => {
                    debug!(url = %pr.url, %status, "pull request last commit status");
                    if status == CommitState::Success && self.options.auto_merge {
                        self.merge_unless_tide(pr).await;
                    }
                    WatchState::OpenStatusKnown(status)
                }
            }
        };

        self.state = state.clone();
        Ok(state)
    }

    async fn merge_unless_tide(&mut self, pr: &PullRequest) {
        if let Some(sha) = pr.last_commit_sha.as_deref() {
            match self
                .platform
                .list_commit_statuses(&pr.owner, &pr.repo, sha)
                .await
            {
                Ok(statuses) if statuses.iter().any(CommitStatus::is_tide) => {
                    debug!(url = %pr.url, "tide is handling the merge");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %pr.url, sha, error = %e, "failed to list commit statuses");
                }
            }
        }

        match self
            .platform
            .merge_pull_request(pr, &self.options.merge_message)
            .await
        {
            Ok(()) => info!(url = %pr.url, "merge requested"),
            Err(e) => {
                self.merge_failures += 1;
                if self.merge_failures == 1 {
                    warn!(url = %pr.url, error = %e, "failed to merge pull request");
                } else {
                    debug!(
                        url = %pr.url,
                        error = %e,
                        failures = self.merge_failures,
                        "merge still failing"
                    );
                }
            }
        }
    }
}
