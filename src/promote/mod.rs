//! Promotion: change the environment repository, then wait for the merge
//!
//! The [`PullRequestCoordinator`] turns a caller supplied change into exactly
//! one open pull request. The [`MergeWatcher`] polls that pull request until
//! it merges, closes or the deadline passes.

mod coordinator;
mod watcher;

pub use coordinator::{PullRequestCoordinator, REMOTE_BRANCH_PREFIX};
pub use watcher::{Clock, MergeWatcher, SystemClock, WatchOptions, WatchState};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Edits tracked files in a working copy.
///
/// Any `Fn(&Path) -> Result<()>` closure is an applier.
#[async_trait]
pub trait ChangeApplier: Send + Sync {
    /// Mutate the checkout at `dir`
    async fn apply(&self, dir: &Path) -> Result<()>;
}

#[async_trait]
impl<F> ChangeApplier for F
where
    F: Fn(&Path) -> Result<()> + Send + Sync,
{
    async fn apply(&self, dir: &Path) -> Result<()> {
        self(dir)
    }
}
