//! Shared test fixtures

#![allow(dead_code)]

pub mod mock_git;
pub mod mock_platform;

pub use mock_git::{GitCall, MockGit};
pub use mock_platform::{MockPlatformService, Refresh, github_config};

use async_trait::async_trait;
use gitops_promote::config::PromoteConfig;
use gitops_promote::context::PromotionContext;
use gitops_promote::promote::Clock;
use gitops_promote::types::{PullRequest, Repository};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Upstream environment repository used across tests
pub const ENV_OWNER: &str = "acme";
pub const ENV_NAME: &str = "environment-staging";
pub const ENV_URL: &str = "https://github.com/acme/environment-staging.git";

/// A repository on github.com
pub fn repo(owner: &str, name: &str) -> Repository {
    Repository {
        owner: owner.to_string(),
        name: name.to_string(),
        clone_url: format!("https://github.com/{owner}/{name}.git"),
        html_url: format!("https://github.com/{owner}/{name}"),
        fork: false,
    }
}

/// An open pull request against the environment repository
pub fn make_pr(number: u64, title: &str, author: &str, head: Option<&str>) -> PullRequest {
    PullRequest {
        number,
        url: format!("https://github.com/{ENV_OWNER}/{ENV_NAME}/pull/{number}"),
        owner: ENV_OWNER.to_string(),
        repo: ENV_NAME.to_string(),
        title: title.to_string(),
        body: None,
        author: Some(author.to_string()),
        head_ref: head.map(ToString::to_string),
        last_commit_sha: Some(format!("sha{number}")),
        merged: false,
        closed: false,
    }
}

/// Clock whose time only moves when something sleeps on it
pub struct ManualClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.now.lock().unwrap() += duration;
    }
}

/// Mocks wired into a context, with handles kept for inspection
pub struct Harness {
    pub platform: Arc<MockPlatformService>,
    pub git: Arc<MockGit>,
    pub clock: Arc<ManualClock>,
    pub ctx: PromotionContext,
}

impl Harness {
    /// User `user` with an existing copy of the environment repository
    pub fn new(user: &str, config: PromoteConfig) -> Self {
        let platform = MockPlatformService::with_config(github_config(ENV_OWNER, ENV_NAME), user);
        platform.add_repository(repo(ENV_OWNER, ENV_NAME));
        if user != ENV_OWNER {
            platform.add_repository(Repository {
                fork: true,
                ..repo(user, ENV_NAME)
            });
        }
        Self::with_platform(platform, config)
    }

    /// Wire an already configured platform mock
    pub fn with_platform(platform: MockPlatformService, config: PromoteConfig) -> Self {
        let platform = Arc::new(platform);
        let git = Arc::new(MockGit::new());
        let clock = Arc::new(ManualClock::new());
        let ctx = PromotionContext::new(platform.clone(), git.clone(), config)
            .with_clock(clock.clone());
        Self {
            platform,
            git,
            clock,
            ctx,
        }
    }
}
