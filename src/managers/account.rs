//! One authenticated GitHub identity.
//!
//! [`Account`] is the recovery boundary between the REST client and the rest
//! of the application: every domain method returns a value, an empty list,
//! `None` or `false` instead of an error. Failures are logged at `warn`.
//! A 401 from any call invalidates the stored credential and restarts the
//! device flow.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::services::credential_store::{CredentialStore, CredentialStoreTrait};
use crate::services::device_flow::{AuthPrompt, DeviceFlow};
use crate::services::github_api::{GitHubClient, IssueUpdate, NewPullRequest, RunFilter};
use crate::services::http_transport::{HttpTransport, ProgressFn};
use crate::types::auth::{AccountState, DeviceFlowOutcome, SetupOutcome};
use crate::types::commit::Commit;
use crate::types::content::ContentItem;
use crate::types::credential::StoredCredential;
use crate::types::errors::ApiError;
use crate::types::event::Event;
use crate::types::issue::{Comment, Issue, IssueState, MergeMethod, PullRequest};
use crate::types::notification::{Notification, ThreadSubscription};
use crate::types::release::Release;
use crate::types::repository::{Branch, Permission, Repository};
use crate::types::search::SearchResult;
use crate::types::user::UserProfile;
use crate::types::workflow::{Workflow, WorkflowJob, WorkflowRun};

#[derive(Debug, Clone, Default)]
struct Identity {
    username: String,
    display_name: String,
    avatar_url: Option<String>,
}

pub struct Account {
    slot: AtomicUsize,
    store: Arc<CredentialStore>,
    client: GitHubClient,
    flow: DeviceFlow,
    prompt: Arc<dyn AuthPrompt>,
    state: Mutex<AccountState>,
    identity: RwLock<Identity>,
    /// Bumped whenever a new token is installed.
    token_generation: AtomicU64,
    auth_lock: tokio::sync::Mutex<()>,
}

impl Account {
    pub fn new(
        slot: usize,
        store: Arc<CredentialStore>,
        transport: Arc<dyn HttpTransport>,
        prompt: Arc<dyn AuthPrompt>,
    ) -> Self {
        Self {
            slot: AtomicUsize::new(slot),
            store,
            client: GitHubClient::new(Arc::clone(&transport), ""),
            flow: DeviceFlow::new(transport),
            prompt,
            state: Mutex::new(AccountState::NoCredential),
            identity: RwLock::new(Identity::default()),
            token_generation: AtomicU64::new(0),
            auth_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot.load(Ordering::SeqCst)
    }

    /// Only the session registry renumbers slots.
    pub(crate) fn set_slot(&self, slot: usize) {
        self.slot.store(slot, Ordering::SeqCst);
    }

    pub fn state(&self) -> AccountState {
        *self.state.lock()
    }

    fn set_state(&self, state: AccountState) {
        debug!(slot = self.slot(), state = state.as_str(), "account state");
        *self.state.lock() = state;
    }

    pub fn is_ready(&self) -> bool {
        self.state() == AccountState::Ready
    }

    pub fn username(&self) -> String {
        self.identity.read().username.clone()
    }

    pub fn display_name(&self) -> String {
        self.identity.read().display_name.clone()
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.identity.read().avatar_url.clone()
    }

    /// Raw client, for callers that want the error instead of a sentinel.
    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// Brings the account to `Ready`: uses the stored credential if there is
    /// one, otherwise runs the device flow. A credential rejected with 401
    /// during verification is cleared and the flow is restarted once.
    pub async fn connect(&self) -> SetupOutcome {
        let _guard = self.auth_lock.lock().await;
        if self.is_ready() {
            return SetupOutcome::Ready;
        }
        self.authenticate().await
    }

    /// Drops the stored credential and runs the device flow again.
    pub async fn reauthenticate(&self) -> SetupOutcome {
        let _guard = self.auth_lock.lock().await;
        self.forget_credential();
        self.authenticate().await
    }

    async fn authenticate(&self) -> SetupOutcome {
        let slot = self.slot();
        let mut restarted = false;

        loop {
            let stored = match self.store.load(slot) {
                Ok(stored) => stored.map(|c| c.token.clone()),
                Err(e) => {
                    warn!(slot, error = %e, "stored credential unreadable");
                    None
                }
            };

            let token = match stored {
                Some(token) if !token.is_empty() => token,
                _ => {
                    self.set_state(AccountState::AuthenticationPending);
                    match self.flow.run(self.prompt.as_ref()).await {
                        DeviceFlowOutcome::Authorized(token) => {
                            self.persist(&token);
                            token
                        }
                        DeviceFlowOutcome::Cancelled => {
                            info!(slot, "account setup cancelled");
                            self.set_state(AccountState::Cancelled);
                            return SetupOutcome::Cancelled;
                        }
                        DeviceFlowOutcome::Failed(reason) => {
                            info!(slot, %reason, "device flow ended without a token");
                            self.set_state(AccountState::Cancelled);
                            return SetupOutcome::Cancelled;
                        }
                    }
                }
            };

            self.set_state(AccountState::Verifying);
            self.install_token(&token);

            match self.client.get_authenticated_user().await {
                Ok(profile) => {
                    {
                        let mut identity = self.identity.write();
                        identity.username = profile.login.clone();
                        identity.display_name = profile.display_name().to_string();
                        identity.avatar_url = (!profile.avatar_url.is_empty()).then(|| profile.avatar_url.clone());
                    }
                    self.persist(&token);
                    self.set_state(AccountState::Ready);
                    info!(slot, login = %profile.login, "account ready");
                    return SetupOutcome::Ready;
                }
                Err(ApiError::Unauthorized) => {
                    warn!(slot, "stored credential rejected");
                    self.forget_credential();
                    if restarted {
                        let reason = "credential rejected after re-authentication".to_string();
                        self.prompt.notify_failure(&reason);
                        return SetupOutcome::Failed(reason);
                    }
                    restarted = true;
                }
                Err(e) => {
                    warn!(slot, error = %e, "credential verification failed");
                    self.set_state(AccountState::NoCredential);
                    self.prompt
                        .notify_failure(&format!("Could not verify GitHub account: {}", e));
                    return SetupOutcome::Failed(e.to_string());
                }
            }
        }
    }

    fn install_token(&self, token: &str) {
        self.client.set_token(token);
        self.token_generation.fetch_add(1, Ordering::SeqCst);
    }

    fn persist(&self, token: &str) {
        let identity = self.identity.read().clone();
        let credential = StoredCredential {
            token: token.to_string(),
            login: identity.username,
            display_name: (!identity.display_name.is_empty()).then_some(identity.display_name),
            avatar_url: identity.avatar_url,
        };
        if let Err(e) = self.store.save(self.slot(), &credential) {
            warn!(slot = self.slot(), error = %e, "could not persist credential");
        }
    }

    fn forget_credential(&self) {
        if let Err(e) = self.store.clear(self.slot()) {
            warn!(slot = self.slot(), error = %e, "could not clear credential");
        }
        self.client.set_token("");
        self.set_state(AccountState::NoCredential);
    }

    /// Runs one client call and converts failure into `None`. Lets callers
    /// tell a failed fetch apart from an empty result.
    pub async fn recover<T>(&self, op: &'static str, call: impl Future<Output = Result<T, ApiError>>) -> Option<T> {
        if !self.is_ready() {
            debug!(slot = self.slot(), op, "account not ready");
            return None;
        }
        let generation = self.token_generation.load(Ordering::SeqCst);
        match call.await {
            Ok(value) => Some(value),
            Err(ApiError::Unauthorized) => {
                warn!(slot = self.slot(), op, "credential rejected");
                self.handle_unauthorized(generation).await;
                None
            }
            Err(e) => {
                warn!(slot = self.slot(), op, error = %e, "request failed");
                None
            }
        }
    }

    async fn handle_unauthorized(&self, generation: u64) {
        let _guard = self.auth_lock.lock().await;
        // A concurrent call already replaced the token that failed here.
        if self.token_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.forget_credential();
        let outcome = self.authenticate().await;
        if outcome != SetupOutcome::Ready {
            warn!(slot = self.slot(), ?outcome, "account unusable until re-authenticated");
        }
    }

    async fn list<T>(&self, op: &'static str, call: impl Future<Output = Result<Vec<T>, ApiError>>) -> Vec<T> {
        self.recover(op, call).await.unwrap_or_default()
    }

    async fn act(&self, op: &'static str, call: impl Future<Output = Result<(), ApiError>>) -> bool {
        self.recover(op, call).await.is_some()
    }

    async fn check(&self, op: &'static str, call: impl Future<Output = Result<bool, ApiError>>) -> bool {
        self.recover(op, call).await.unwrap_or(false)
    }

    // ============ Users ============

    pub async fn get_user(&self, username: &str) -> Option<UserProfile> {
        self.recover("get_user", self.client.get_user(username)).await
    }

    pub async fn get_following(&self) -> Vec<UserProfile> {
        self.list("get_following", self.client.get_following()).await
    }

    pub async fn is_following(&self, username: &str) -> bool {
        self.check("is_following", self.client.is_following(username)).await
    }

    pub async fn follow_user(&self, username: &str) -> bool {
        self.act("follow_user", self.client.follow_user(username)).await
    }

    pub async fn unfollow_user(&self, username: &str) -> bool {
        self.act("unfollow_user", self.client.unfollow_user(username)).await
    }

    // ============ Repositories ============

    pub async fn get_repos(&self, sort: &str) -> Vec<Repository> {
        self.list("get_repos", self.client.get_repos(sort)).await
    }

    pub async fn get_user_repos(&self, username: &str, sort: &str) -> Vec<Repository> {
        self.list("get_user_repos", self.client.get_user_repos(username, sort))
            .await
    }

    pub async fn get_starred(&self) -> Vec<Repository> {
        self.list("get_starred", self.client.get_starred()).await
    }

    pub async fn get_watched(&self) -> Vec<Repository> {
        self.list("get_watched", self.client.get_watched()).await
    }

    pub async fn get_repo(&self, owner: &str, repo: &str) -> Option<Repository> {
        self.recover("get_repo", self.client.get_repo(owner, repo)).await
    }

    pub async fn get_repo_permission(&self, owner: &str, repo: &str) -> Option<Permission> {
        self.recover("get_repo_permission", self.client.get_repo_permission(owner, repo))
            .await
            .flatten()
    }

    pub async fn is_starred(&self, owner: &str, repo: &str) -> bool {
        self.check("is_starred", self.client.is_starred(owner, repo)).await
    }

    pub async fn star_repo(&self, owner: &str, repo: &str) -> bool {
        self.act("star_repo", self.client.star_repo(owner, repo)).await
    }

    pub async fn unstar_repo(&self, owner: &str, repo: &str) -> bool {
        self.act("unstar_repo", self.client.unstar_repo(owner, repo)).await
    }

    pub async fn is_watching(&self, owner: &str, repo: &str) -> bool {
        self.check("is_watching", self.client.is_watching(owner, repo)).await
    }

    pub async fn watch_repo(&self, owner: &str, repo: &str) -> bool {
        self.act("watch_repo", self.client.watch_repo(owner, repo)).await
    }

    pub async fn unwatch_repo(&self, owner: &str, repo: &str) -> bool {
        self.act("unwatch_repo", self.client.unwatch_repo(owner, repo)).await
    }

    pub async fn get_branches(&self, owner: &str, repo: &str) -> Vec<Branch> {
        self.list("get_branches", self.client.get_branches(owner, repo)).await
    }

    // ============ Issues ============

    pub async fn get_issues(&self, owner: &str, repo: &str, state: IssueState) -> Vec<Issue> {
        self.list("get_issues", self.client.get_issues(owner, repo, state))
            .await
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Option<Issue> {
        self.recover("get_issue", self.client.get_issue(owner, repo, number))
            .await
    }

    pub async fn create_issue(&self, owner: &str, repo: &str, title: &str, body: &str, labels: &[String]) -> Option<Issue> {
        self.recover(
            "create_issue",
            self.client.create_issue(owner, repo, title, body, labels),
        )
        .await
    }

    pub async fn update_issue(&self, owner: &str, repo: &str, number: u64, update: &IssueUpdate) -> Option<Issue> {
        self.recover("update_issue", self.client.update_issue(owner, repo, number, update))
            .await
    }

    pub async fn close_issue(&self, owner: &str, repo: &str, number: u64) -> bool {
        self.update_issue(owner, repo, number, &IssueUpdate::state("closed"))
            .await
            .is_some()
    }

    pub async fn reopen_issue(&self, owner: &str, repo: &str, number: u64) -> bool {
        self.update_issue(owner, repo, number, &IssueUpdate::state("open"))
            .await
            .is_some()
    }

    pub async fn get_issue_comments(&self, owner: &str, repo: &str, number: u64) -> Vec<Comment> {
        self.list("get_issue_comments", self.client.get_issue_comments(owner, repo, number))
            .await
    }

    pub async fn create_issue_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Option<Comment> {
        self.recover(
            "create_issue_comment",
            self.client.create_issue_comment(owner, repo, number, body),
        )
        .await
    }

    pub async fn delete_issue_comment(&self, owner: &str, repo: &str, comment_id: u64) -> bool {
        self.act(
            "delete_issue_comment",
            self.client.delete_issue_comment(owner, repo, comment_id),
        )
        .await
    }

    // ============ Pull requests ============

    pub async fn get_pull_requests(&self, owner: &str, repo: &str, state: IssueState) -> Vec<PullRequest> {
        self.list("get_pull_requests", self.client.get_pull_requests(owner, repo, state))
            .await
    }

    pub async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Option<PullRequest> {
        self.recover("get_pull_request", self.client.get_pull_request(owner, repo, number))
            .await
    }

    pub async fn create_pull_request(&self, owner: &str, repo: &str, pr: &NewPullRequest) -> Option<PullRequest> {
        self.recover("create_pull_request", self.client.create_pull_request(owner, repo, pr))
            .await
    }

    pub async fn update_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        update: &IssueUpdate,
    ) -> Option<PullRequest> {
        self.recover(
            "update_pull_request",
            self.client.update_pull_request(owner, repo, number, update),
        )
        .await
    }

    pub async fn close_pull_request(&self, owner: &str, repo: &str, number: u64) -> bool {
        self.update_pull_request(owner, repo, number, &IssueUpdate::state("closed"))
            .await
            .is_some()
    }

    pub async fn reopen_pull_request(&self, owner: &str, repo: &str, number: u64) -> bool {
        self.update_pull_request(owner, repo, number, &IssueUpdate::state("open"))
            .await
            .is_some()
    }

    pub async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        method: MergeMethod,
        commit_title: Option<&str>,
        commit_message: Option<&str>,
    ) -> bool {
        self.act(
            "merge_pull_request",
            self.client
                .merge_pull_request(owner, repo, number, method, commit_title, commit_message),
        )
        .await
    }

    /// Conversation comments on a pull request live on its issue.
    pub async fn get_pull_request_comments(&self, owner: &str, repo: &str, number: u64) -> Vec<Comment> {
        self.get_issue_comments(owner, repo, number).await
    }

    pub async fn create_pull_request_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Option<Comment> {
        self.create_issue_comment(owner, repo, number, body).await
    }

    // ============ Commits ============

    /// `max_commits == 0` loads the whole history.
    pub async fn get_commits(&self, owner: &str, repo: &str, sha: Option<&str>, max_commits: usize) -> Vec<Commit> {
        self.list("get_commits", self.client.get_commits(owner, repo, sha, max_commits))
            .await
    }

    pub async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Option<Commit> {
        self.recover("get_commit", self.client.get_commit(owner, repo, sha))
            .await
    }

    // ============ Search ============

    pub async fn search_repos(&self, query: &str, sort: &str) -> Vec<Repository> {
        self.list("search_repos", self.client.search_repos(query, sort)).await
    }

    pub async fn search_users(&self, query: &str, sort: &str) -> Vec<UserProfile> {
        self.list("search_users", self.client.search_users(query, sort)).await
    }

    /// Repositories then users matching `query`, as one tagged list.
    pub async fn search_all(&self, query: &str) -> Vec<SearchResult> {
        let (repos, users) = tokio::join!(
            self.search_repos(query, "best-match"),
            self.search_users(query, "best-match")
        );
        repos
            .into_iter()
            .map(SearchResult::Repository)
            .chain(users.into_iter().map(SearchResult::User))
            .collect()
    }

    // ============ Actions ============

    pub async fn get_workflows(&self, owner: &str, repo: &str) -> Vec<Workflow> {
        self.list("get_workflows", self.client.get_workflows(owner, repo)).await
    }

    pub async fn get_workflow_runs(&self, owner: &str, repo: &str, filter: &RunFilter) -> Vec<WorkflowRun> {
        self.list("get_workflow_runs", self.client.get_workflow_runs(owner, repo, filter))
            .await
    }

    pub async fn get_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> Option<WorkflowRun> {
        self.recover("get_workflow_run", self.client.get_workflow_run(owner, repo, run_id))
            .await
    }

    pub async fn get_workflow_run_jobs(&self, owner: &str, repo: &str, run_id: u64) -> Vec<WorkflowJob> {
        self.list(
            "get_workflow_run_jobs",
            self.client.get_workflow_run_jobs(owner, repo, run_id),
        )
        .await
    }

    pub async fn rerun_workflow(&self, owner: &str, repo: &str, run_id: u64) -> bool {
        self.act("rerun_workflow", self.client.rerun_workflow(owner, repo, run_id))
            .await
    }

    pub async fn rerun_failed_jobs(&self, owner: &str, repo: &str, run_id: u64) -> bool {
        self.act("rerun_failed_jobs", self.client.rerun_failed_jobs(owner, repo, run_id))
            .await
    }

    pub async fn cancel_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> bool {
        self.act("cancel_workflow_run", self.client.cancel_workflow_run(owner, repo, run_id))
            .await
    }

    pub async fn get_workflow_run_logs_url(&self, owner: &str, repo: &str, run_id: u64) -> Option<String> {
        self.recover(
            "get_workflow_run_logs_url",
            self.client.get_workflow_run_logs_url(owner, repo, run_id),
        )
        .await
    }

    pub async fn get_job_logs(&self, owner: &str, repo: &str, job_id: u64) -> Option<String> {
        self.recover("get_job_logs", self.client.get_job_logs(owner, repo, job_id))
            .await
    }

    // ============ Releases ============

    pub async fn get_releases(&self, owner: &str, repo: &str) -> Vec<Release> {
        self.list("get_releases", self.client.get_releases(owner, repo)).await
    }

    pub async fn get_release(&self, owner: &str, repo: &str, release_id: u64) -> Option<Release> {
        self.recover("get_release", self.client.get_release(owner, repo, release_id))
            .await
    }

    pub async fn get_latest_release(&self, owner: &str, repo: &str) -> Option<Release> {
        self.recover("get_latest_release", self.client.get_latest_release(owner, repo))
            .await
    }

    pub async fn get_release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Option<Release> {
        self.recover("get_release_by_tag", self.client.get_release_by_tag(owner, repo, tag))
            .await
    }

    /// Streams an asset into `sink`; returns the byte count.
    pub async fn download_asset(
        &self,
        owner: &str,
        repo: &str,
        asset_id: u64,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: ProgressFn<'_>,
    ) -> Option<u64> {
        self.recover(
            "download_asset",
            self.client.download_asset(owner, repo, asset_id, sink, progress),
        )
        .await
    }

    // ============ Notifications ============

    pub async fn get_notifications(&self, all: bool, participating: bool) -> Vec<Notification> {
        self.list("get_notifications", self.client.get_notifications(all, participating))
            .await
    }

    pub async fn get_repo_notifications(&self, owner: &str, repo: &str, all: bool, participating: bool) -> Vec<Notification> {
        self.list(
            "get_repo_notifications",
            self.client.get_repo_notifications(owner, repo, all, participating),
        )
        .await
    }

    pub async fn mark_notifications_read(&self, last_read_at: Option<DateTime<Utc>>) -> bool {
        self.act("mark_notifications_read", self.client.mark_notifications_read(last_read_at))
            .await
    }

    pub async fn mark_repo_notifications_read(&self, owner: &str, repo: &str, last_read_at: Option<DateTime<Utc>>) -> bool {
        self.act(
            "mark_repo_notifications_read",
            self.client.mark_repo_notifications_read(owner, repo, last_read_at),
        )
        .await
    }

    pub async fn mark_thread_read(&self, thread_id: &str) -> bool {
        self.act("mark_thread_read", self.client.mark_thread_read(thread_id)).await
    }

    pub async fn mark_thread_done(&self, thread_id: &str) -> bool {
        self.act("mark_thread_done", self.client.mark_thread_done(thread_id)).await
    }

    pub async fn get_thread_subscription(&self, thread_id: &str) -> Option<ThreadSubscription> {
        self.recover("get_thread_subscription", self.client.get_thread_subscription(thread_id))
            .await
    }

    pub async fn subscribe_to_thread(&self, thread_id: &str) -> bool {
        self.act("subscribe_to_thread", self.client.subscribe_to_thread(thread_id))
            .await
    }

    pub async fn unsubscribe_from_thread(&self, thread_id: &str) -> bool {
        self.act("unsubscribe_from_thread", self.client.unsubscribe_from_thread(thread_id))
            .await
    }

    pub async fn mute_thread(&self, thread_id: &str) -> bool {
        self.act("mute_thread", self.client.mute_thread(thread_id)).await
    }

    // ============ Events ============

    /// This account's activity feed.
    pub async fn get_received_events(&self) -> Vec<Event> {
        let username = self.username();
        if username.is_empty() {
            return Vec::new();
        }
        self.list("get_received_events", self.client.get_received_events(&username))
            .await
    }

    pub async fn get_user_events(&self, username: &str) -> Vec<Event> {
        self.list("get_user_events", self.client.get_user_events(username)).await
    }

    pub async fn get_repo_events(&self, owner: &str, repo: &str) -> Vec<Event> {
        self.list("get_repo_events", self.client.get_repo_events(owner, repo))
            .await
    }

    pub async fn get_org_events(&self, org: &str) -> Vec<Event> {
        self.list("get_org_events", self.client.get_org_events(org)).await
    }

    // ============ Contents ============

    pub async fn get_contents(&self, owner: &str, repo: &str, path: &str, git_ref: Option<&str>) -> Vec<ContentItem> {
        self.list("get_contents", self.client.get_contents(owner, repo, path, git_ref))
            .await
    }

    pub async fn get_file_content(&self, owner: &str, repo: &str, path: &str, git_ref: Option<&str>) -> Option<String> {
        self.recover(
            "get_file_content",
            self.client.get_file_content(owner, repo, path, git_ref),
        )
        .await
    }
}
