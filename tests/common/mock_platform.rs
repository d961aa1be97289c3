//! Mock platform service for testing

#![allow(dead_code)]

use async_trait::async_trait;
use gitops_promote::error::{Error, Result};
use gitops_promote::platform::{
    Capability, CommitStatusService, ForkService, PlatformService, PullRequestService,
    RepositoryService,
};
use gitops_promote::types::{
    CommitState, CommitStatus, Platform, PlatformConfig, PullRequest, PullRequestArguments,
    Repository,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Call record for `fork_repository`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkCall {
    pub owner: String,
    pub name: String,
    pub organisation: String,
}

/// Call record for `add_pr_comment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCall {
    pub pr_number: u64,
    pub body: String,
}

/// Call record for `merge_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub pr_number: u64,
    pub message: String,
}

/// What one `update_pull_request_status` call reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    Open,
    Merged,
    Closed,
    Fail(String),
}

/// Hand-written platform double.
///
/// Created pull requests are kept as open pull requests, so a second
/// promotion with the same title sees the first one. Refreshes and commit
/// statuses are scripted per call; once a script runs out the pull request
/// stays open (or merged, after a successful merge) and CI stays pending.
pub struct MockPlatformService {
    config: PlatformConfig,
    username: Mutex<String>,
    repositories: Mutex<HashMap<(String, String), Repository>>,
    fork_supported: AtomicBool,
    next_pr_number: AtomicU64,
    open_prs: Mutex<Vec<PullRequest>>,
    refresh_script: Mutex<VecDeque<Refresh>>,
    status_script: Mutex<VecDeque<std::result::Result<CommitState, String>>>,
    commit_statuses: Mutex<Vec<CommitStatus>>,
    merged: AtomicBool,
    // Call tracking
    fork_calls: Mutex<Vec<ForkCall>>,
    list_pr_calls: AtomicUsize,
    create_pr_calls: Mutex<Vec<PullRequestArguments>>,
    update_pr_calls: Mutex<Vec<(u64, PullRequestArguments)>>,
    comment_calls: Mutex<Vec<CommentCall>>,
    label_calls: Mutex<Vec<(u64, Vec<String>)>>,
    refresh_calls: AtomicUsize,
    status_calls: AtomicUsize,
    list_status_calls: AtomicUsize,
    merge_calls: Mutex<Vec<MergeCall>>,
    // Error injection
    error_on_username: Mutex<Option<String>>,
    error_on_fork: Mutex<Option<String>>,
    error_on_create_pr: Mutex<Option<String>>,
    error_on_list_statuses: Mutex<Option<String>>,
    error_on_merge: Mutex<Option<String>>,
}

impl MockPlatformService {
    /// Create a mock acting as `username` against `config`
    pub fn with_config(config: PlatformConfig, username: &str) -> Self {
        Self {
            config,
            username: Mutex::new(username.to_string()),
            repositories: Mutex::new(HashMap::new()),
            fork_supported: AtomicBool::new(true),
            next_pr_number: AtomicU64::new(1),
            open_prs: Mutex::new(Vec::new()),
            refresh_script: Mutex::new(VecDeque::new()),
            status_script: Mutex::new(VecDeque::new()),
            commit_statuses: Mutex::new(Vec::new()),
            merged: AtomicBool::new(false),
            fork_calls: Mutex::new(Vec::new()),
            list_pr_calls: AtomicUsize::new(0),
            create_pr_calls: Mutex::new(Vec::new()),
            update_pr_calls: Mutex::new(Vec::new()),
            comment_calls: Mutex::new(Vec::new()),
            label_calls: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            list_status_calls: AtomicUsize::new(0),
            merge_calls: Mutex::new(Vec::new()),
            error_on_username: Mutex::new(None),
            error_on_fork: Mutex::new(None),
            error_on_create_pr: Mutex::new(None),
            error_on_list_statuses: Mutex::new(None),
            error_on_merge: Mutex::new(None),
        }
    }

    // === Setup ===

    /// Register a repository `get_repository` can find
    pub fn add_repository(&self, repo: Repository) {
        self.repositories
            .lock()
            .unwrap()
            .insert((repo.owner.clone(), repo.name.clone()), repo);
    }

    /// Report forking as unsupported
    pub fn disable_forking(&self) {
        self.fork_supported.store(false, Ordering::SeqCst);
    }

    /// Add an already open pull request
    pub fn add_open_pr(&self, pr: PullRequest) {
        self.open_prs.lock().unwrap().push(pr);
    }

    /// Queue refresh results, consumed one per call
    pub fn script_refreshes(&self, refreshes: impl IntoIterator<Item = Refresh>) {
        self.refresh_script.lock().unwrap().extend(refreshes);
    }

    /// Queue commit status results, consumed one per call
    pub fn script_statuses(
        &self,
        statuses: impl IntoIterator<Item = std::result::Result<CommitState, String>>,
    ) {
        self.status_script.lock().unwrap().extend(statuses);
    }

    /// Individual statuses returned by `list_commit_statuses`
    pub fn set_commit_statuses(&self, statuses: Vec<CommitStatus>) {
        *self.commit_statuses.lock().unwrap() = statuses;
    }

    // === Error injection ===

    pub fn fail_username(&self, msg: &str) {
        *self.error_on_username.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_fork(&self, msg: &str) {
        *self.error_on_fork.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_create_pr(&self, msg: &str) {
        *self.error_on_create_pr.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_list_statuses(&self, msg: &str) {
        *self.error_on_list_statuses.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_merge(&self, msg: &str) {
        *self.error_on_merge.lock().unwrap() = Some(msg.to_string());
    }

    // === Call inspection ===

    pub fn open_prs(&self) -> Vec<PullRequest> {
        self.open_prs.lock().unwrap().clone()
    }

    pub fn get_fork_calls(&self) -> Vec<ForkCall> {
        self.fork_calls.lock().unwrap().clone()
    }

    pub fn get_create_pr_calls(&self) -> Vec<PullRequestArguments> {
        self.create_pr_calls.lock().unwrap().clone()
    }

    pub fn get_update_pr_calls(&self) -> Vec<(u64, PullRequestArguments)> {
        self.update_pr_calls.lock().unwrap().clone()
    }

    pub fn get_comment_calls(&self) -> Vec<CommentCall> {
        self.comment_calls.lock().unwrap().clone()
    }

    pub fn get_label_calls(&self) -> Vec<(u64, Vec<String>)> {
        self.label_calls.lock().unwrap().clone()
    }

    pub fn get_merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    pub fn list_pr_count(&self) -> usize {
        self.list_pr_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn list_status_count(&self) -> usize {
        self.list_status_calls.load(Ordering::SeqCst)
    }

    // === Assertions ===

    pub fn assert_create_pr_count(&self, expected: usize) {
        let calls = self.get_create_pr_calls();
        assert_eq!(
            calls.len(),
            expected,
            "expected {expected} create_pull_request calls, got {}: {calls:?}",
            calls.len()
        );
    }

    pub fn assert_no_merge(&self) {
        let calls = self.get_merge_calls();
        assert!(calls.is_empty(), "expected no merge calls, got {calls:?}");
    }

    fn injected(slot: &Mutex<Option<String>>) -> Result<()> {
        match slot.lock().unwrap().as_ref() {
            Some(msg) => Err(Error::Platform(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RepositoryService for MockPlatformService {
    async fn current_username(&self) -> Result<String> {
        Self::injected(&self.error_on_username)?;
        Ok(self.username.lock().unwrap().clone())
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        Ok(self
            .repositories
            .lock()
            .unwrap()
            .get(&(owner.to_string(), name.to_string()))
            .cloned())
    }

    fn forking(&self) -> Capability<&dyn ForkService> {
        if self.fork_supported.load(Ordering::SeqCst) {
            Capability::Available(self)
        } else {
            Capability::Unsupported {
                reason: "mock provider without forks",
            }
        }
    }
}

#[async_trait]
impl ForkService for MockPlatformService {
    async fn fork_repository(
        &self,
        owner: &str,
        name: &str,
        organisation: &str,
    ) -> Result<Repository> {
        self.fork_calls.lock().unwrap().push(ForkCall {
            owner: owner.to_string(),
            name: name.to_string(),
            organisation: organisation.to_string(),
        });
        Self::injected(&self.error_on_fork)?;

        let user = self.username.lock().unwrap().clone();
        let fork = super::repo(&user, name);
        let fork = Repository { fork: true, ..fork };
        self.add_repository(fork.clone());
        Ok(fork)
    }
}

#[async_trait]
impl PullRequestService for MockPlatformService {
    async fn list_open_pull_requests(&self, owner: &str, name: &str) -> Result<Vec<PullRequest>> {
        self.list_pr_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .open_prs
            .lock()
            .unwrap()
            .iter()
            .filter(|pr| pr.owner == owner && pr.repo == name)
            .cloned()
            .collect())
    }

    async fn create_pull_request(&self, args: &PullRequestArguments) -> Result<PullRequest> {
        self.create_pr_calls.lock().unwrap().push(args.clone());
        Self::injected(&self.error_on_create_pr)?;

        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let author = args.head.split(':').next().map(ToString::to_string);
        let pr = PullRequest {
            number,
            url: format!(
                "https://github.com/{}/{}/pull/{number}",
                args.owner, args.repo
            ),
            owner: args.owner.clone(),
            repo: args.repo.clone(),
            title: args.title.clone(),
            body: Some(args.body.clone()),
            author,
            head_ref: Some(args.head.clone()),
            last_commit_sha: Some(format!("sha{number}")),
            merged: false,
            closed: false,
        };
        self.add_open_pr(pr.clone());
        Ok(pr)
    }

    async fn update_pull_request(
        &self,
        pr: &PullRequest,
        args: &PullRequestArguments,
    ) -> Result<PullRequest> {
        self.update_pr_calls
            .lock()
            .unwrap()
            .push((pr.number, args.clone()));
        Ok(PullRequest {
            title: args.title.clone(),
            body: Some(args.body.clone()),
            ..pr.clone()
        })
    }

    async fn add_pr_comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        self.comment_calls.lock().unwrap().push(CommentCall {
            pr_number: pr.number,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn add_labels(&self, pr: &PullRequest, labels: &[String]) -> Result<()> {
        self.label_calls
            .lock()
            .unwrap()
            .push((pr.number, labels.to_vec()));
        Ok(())
    }

    async fn update_pull_request_status(&self, pr: &mut PullRequest) -> Result<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.refresh_script.lock().unwrap().pop_front();
        let refresh = next.unwrap_or_else(|| {
            if self.merged.load(Ordering::SeqCst) {
                Refresh::Merged
            } else {
                Refresh::Open
            }
        });

        match refresh {
            Refresh::Open => {}
            Refresh::Merged => {
                pr.merged = true;
                pr.closed = true;
            }
            Refresh::Closed => pr.closed = true,
            Refresh::Fail(msg) => return Err(Error::Platform(msg)),
        }
        Ok(())
    }

    async fn merge_pull_request(&self, pr: &PullRequest, message: &str) -> Result<()> {
        self.merge_calls.lock().unwrap().push(MergeCall {
            pr_number: pr.number,
            message: message.to_string(),
        });
        Self::injected(&self.error_on_merge)?;
        self.merged.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CommitStatusService for MockPlatformService {
    async fn pull_request_last_commit_status(&self, _pr: &PullRequest) -> Result<CommitState> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.status_script.lock().unwrap().pop_front() {
            Some(Ok(state)) => Ok(state),
            Some(Err(msg)) => Err(Error::Platform(msg)),
            None => Ok(CommitState::Pending),
        }
    }

    async fn list_commit_statuses(
        &self,
        _owner: &str,
        _repo: &str,
        _sha: &str,
    ) -> Result<Vec<CommitStatus>> {
        self.list_status_calls.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.error_on_list_statuses)?;
        Ok(self.commit_statuses.lock().unwrap().clone())
    }
}

impl PlatformService for MockPlatformService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}

/// GitHub config for `owner/repo`
pub fn github_config(owner: &str, repo: &str) -> PlatformConfig {
    PlatformConfig {
        platform: Platform::GitHub,
        owner: owner.to_string(),
        repo: repo.to_string(),
        host: None,
    }
}
