//! GitHub REST client.
//!
//! Wraps authenticated calls to the REST API, drives page/per_page pagination
//! and maps JSON payloads onto the typed records in [`crate::types`]. Every
//! operation returns `Result`; turning failures into sentinels is the job of
//! [`crate::managers::account::Account`].
//!
//! One client is shared by every task working for an account, so it keeps no
//! per-call mutable state. The bearer token sits behind a lock and is only
//! swapped after re-authentication.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use crate::services::http_transport::{HttpRequest, HttpResponse, HttpTransport, Method, ProgressFn};
use crate::types::commit::Commit;
use crate::types::content::ContentItem;
use crate::types::errors::ApiError;
use crate::types::event::Event;
use crate::types::issue::{Comment, Issue, IssueState, MergeMethod, PullRequest};
use crate::types::notification::{Notification, ThreadSubscription};
use crate::types::release::Release;
use crate::types::repository::{Branch, Permission, Repository};
use crate::types::search::SearchPage;
use crate::types::user::UserProfile;
use crate::types::workflow::{Workflow, WorkflowJob, WorkflowRun};

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const DEFAULT_PER_PAGE: usize = 100;
const SEARCH_PER_PAGE: usize = 30;
const EVENTS_PER_PAGE: usize = 30;
const RELEASES_PER_PAGE: usize = 30;
const RUNS_PER_PAGE: usize = 30;
const NOTIFICATIONS_PER_PAGE: usize = 50;
const RECEIVED_EVENTS_MAX_PAGES: usize = 3;

/// How far a listing should page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub per_page: usize,
    pub max_items: Option<usize>,
    pub max_pages: Option<usize>,
    /// A failing later page fails the whole listing instead of returning
    /// what was collected so far.
    pub complete: bool,
}

impl PageSpec {
    /// Every page until the data runs out.
    pub fn all(per_page: usize) -> Self {
        Self {
            per_page: per_page.max(1),
            max_items: None,
            max_pages: None,
            complete: false,
        }
    }

    /// Stops as soon as `max_items` are collected; 0 means no limit.
    pub fn limited(per_page: usize, max_items: usize) -> Self {
        Self {
            max_items: (max_items > 0).then_some(max_items),
            ..Self::all(per_page)
        }
    }

    pub fn pages(per_page: usize, max_pages: usize) -> Self {
        Self {
            max_pages: Some(max_pages),
            ..Self::all(per_page)
        }
    }

    pub fn complete(self) -> Self {
        Self { complete: true, ..self }
    }

    /// Page size actually requested: never larger than the item limit.
    pub fn effective_per_page(&self) -> usize {
        match self.max_items {
            Some(max) if max < self.per_page => max,
            _ => self.per_page,
        }
    }
}

/// Fields for PATCHing an issue or pull request. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<String>,
}

impl IssueUpdate {
    pub fn state(state: &str) -> Self {
        Self {
            state: Some(state.to_string()),
            ..Self::default()
        }
    }

    fn to_json(&self) -> Value {
        let mut body = serde_json::Map::new();
        if let Some(title) = &self.title {
            body.insert("title".into(), json!(title));
        }
        if let Some(text) = &self.body {
            body.insert("body".into(), json!(text));
        }
        if let Some(state) = &self.state {
            body.insert("state".into(), json!(state));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub draft: bool,
}

/// Optional filters for workflow run listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunFilter {
    pub workflow_id: Option<u64>,
    pub branch: Option<String>,
    pub status: Option<String>,
}

pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: RwLock<String>,
}

impl GitHubClient {
    pub fn new(transport: Arc<dyn HttpTransport>, token: impl Into<String>) -> Self {
        Self::with_base_url(transport, GITHUB_API_URL, token)
    }

    pub fn with_base_url(transport: Arc<dyn HttpTransport>, base_url: &str, token: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(token.into()),
        }
    }

    pub fn set_token(&self, token: &str) {
        *self.token.write() = token.to_string();
    }

    pub fn has_token(&self) -> bool {
        !self.token.read().is_empty()
    }

    fn request(&self, method: Method, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.token.read()))
            .header("Accept", ACCEPT_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Sends a request; only a 401 is turned into an error here.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.transport.send(request).await?;
        if response.status == 401 {
            return Err(ApiError::Unauthorized);
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, ApiError> {
        let path = request.path();
        let response = self.send(request).await?;
        if response.status != 200 {
            return Err(ApiError::Status {
                status: response.status,
                path,
            });
        }
        response.json()
    }

    /// Sends `request` and decodes the body if the status is one of `accepted`.
    async fn send_for<T: DeserializeOwned>(&self, request: HttpRequest, accepted: &[u16]) -> Result<T, ApiError> {
        let path = request.path();
        let response = self.send(request).await?;
        if !accepted.contains(&response.status) {
            return Err(ApiError::Status {
                status: response.status,
                path,
            });
        }
        response.json()
    }

    /// Sends a mutation whose success is signalled purely by status code.
    async fn expect_status(&self, request: HttpRequest, accepted: &[u16]) -> Result<(), ApiError> {
        let path = request.path();
        let method = request.method;
        let response = self.send(request).await?;
        if accepted.contains(&response.status) {
            debug!(method = method.as_str(), %path, status = response.status, "mutation accepted");
            Ok(())
        } else {
            Err(ApiError::Status {
                status: response.status,
                path,
            })
        }
    }

    /// Membership checks (`is_starred`, `is_following`): `yes` or 404.
    async fn check_membership(&self, request: HttpRequest, yes: u16) -> Result<bool, ApiError> {
        let path = request.path();
        let response = self.send(request).await?;
        match response.status {
            s if s == yes => Ok(true),
            404 => Ok(false),
            status => Err(ApiError::Status { status, path }),
        }
    }

    /// Walks `page=1..` until an empty page, a short page, the page cap or the
    /// item cap. A failing first page is an error. A failing later page ends the
    /// walk with what was already collected, or is an error for a
    /// [`complete`](PageSpec::complete) spec.
    pub async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        spec: PageSpec,
    ) -> Result<Vec<T>, ApiError> {
        self.paginate_inner(path, query, spec, None).await
    }

    async fn paginate_inner<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        spec: PageSpec,
        envelope: Option<&str>,
    ) -> Result<Vec<T>, ApiError> {
        let per_page = spec.effective_per_page();
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            if spec.max_pages.is_some_and(|max| page > max) {
                break;
            }

            let mut request = self
                .request(Method::Get, path)
                .query("per_page", per_page)
                .query("page", page);
            for (k, v) in query {
                request = request.query(k, v);
            }

            let response = self.send(request).await?;
            if response.status != 200 {
                if page == 1 || spec.complete {
                    return Err(ApiError::Status {
                        status: response.status,
                        path: path.to_string(),
                    });
                }
                warn!(path, page, status = response.status, "pagination stopped early");
                break;
            }

            let body: Value = response.json()?;
            let batch = match envelope {
                Some(key) => body.get(key).cloned().unwrap_or_else(|| Value::Array(Vec::new())),
                None => body,
            };
            let batch: Vec<T> = serde_json::from_value(batch)?;
            let count = batch.len();
            if count == 0 {
                break;
            }

            for item in batch {
                items.push(item);
                if spec.max_items.is_some_and(|max| items.len() >= max) {
                    return Ok(items);
                }
            }

            if count < per_page {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    // ============ Users ============

    /// The authenticated user's own profile; used to verify a credential.
    pub async fn get_authenticated_user(&self) -> Result<UserProfile, ApiError> {
        self.get_json(self.request(Method::Get, "/user")).await
    }

    pub async fn get_user(&self, username: &str) -> Result<UserProfile, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/users/{}", username)))
            .await
    }

    pub async fn get_following(&self) -> Result<Vec<UserProfile>, ApiError> {
        self.paginate("/user/following", &[], PageSpec::all(DEFAULT_PER_PAGE))
            .await
    }

    pub async fn is_following(&self, username: &str) -> Result<bool, ApiError> {
        self.check_membership(self.request(Method::Get, &format!("/user/following/{}", username)), 204)
            .await
    }

    pub async fn follow_user(&self, username: &str) -> Result<(), ApiError> {
        self.expect_status(self.request(Method::Put, &format!("/user/following/{}", username)), &[204])
            .await
    }

    pub async fn unfollow_user(&self, username: &str) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Delete, &format!("/user/following/{}", username)),
            &[204],
        )
        .await
    }

    // ============ Repositories ============

    pub async fn get_repos(&self, sort: &str) -> Result<Vec<Repository>, ApiError> {
        let query = [
            ("sort", sort.to_string()),
            ("direction", "desc".to_string()),
            ("affiliation", "owner,collaborator,organization_member".to_string()),
        ];
        self.paginate("/user/repos", &query, PageSpec::all(DEFAULT_PER_PAGE))
            .await
    }

    pub async fn get_user_repos(&self, username: &str, sort: &str) -> Result<Vec<Repository>, ApiError> {
        let query = [("sort", sort.to_string()), ("direction", "desc".to_string())];
        self.paginate(&format!("/users/{}/repos", username), &query, PageSpec::all(DEFAULT_PER_PAGE))
            .await
    }

    /// Starred repositories, most recently updated first. All pages or an error.
    pub async fn get_starred(&self) -> Result<Vec<Repository>, ApiError> {
        let query = [("sort", "updated".to_string()), ("direction", "desc".to_string())];
        let mut repos: Vec<Repository> = self
            .paginate("/user/starred", &query, PageSpec::all(DEFAULT_PER_PAGE).complete())
            .await?;
        sort_by_updated_desc(&mut repos);
        Ok(repos)
    }

    /// Watched repositories, most recently updated first. All pages or an error.
    pub async fn get_watched(&self) -> Result<Vec<Repository>, ApiError> {
        let mut repos: Vec<Repository> = self
            .paginate("/user/subscriptions", &[], PageSpec::all(DEFAULT_PER_PAGE).complete())
            .await?;
        sort_by_updated_desc(&mut repos);
        Ok(repos)
    }

    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repository, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}", owner, repo)))
            .await
    }

    pub async fn get_repo_permission(&self, owner: &str, repo: &str) -> Result<Option<Permission>, ApiError> {
        Ok(self.get_repo(owner, repo).await?.permission())
    }

    pub async fn is_starred(&self, owner: &str, repo: &str) -> Result<bool, ApiError> {
        self.check_membership(self.request(Method::Get, &format!("/user/starred/{}/{}", owner, repo)), 204)
            .await
    }

    pub async fn star_repo(&self, owner: &str, repo: &str) -> Result<(), ApiError> {
        self.expect_status(self.request(Method::Put, &format!("/user/starred/{}/{}", owner, repo)), &[204])
            .await
    }

    pub async fn unstar_repo(&self, owner: &str, repo: &str) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Delete, &format!("/user/starred/{}/{}", owner, repo)),
            &[204],
        )
        .await
    }

    pub async fn is_watching(&self, owner: &str, repo: &str) -> Result<bool, ApiError> {
        self.check_membership(
            self.request(Method::Get, &format!("/repos/{}/{}/subscription", owner, repo)),
            200,
        )
        .await
    }

    pub async fn watch_repo(&self, owner: &str, repo: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::Put, &format!("/repos/{}/{}/subscription", owner, repo))
            .json(json!({ "subscribed": true }));
        self.expect_status(request, &[200]).await
    }

    pub async fn unwatch_repo(&self, owner: &str, repo: &str) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Delete, &format!("/repos/{}/{}/subscription", owner, repo)),
            &[204],
        )
        .await
    }

    /// Branches ordered by their head commit's date, newest first. Branches
    /// whose commit cannot be fetched sort last.
    pub async fn get_branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>, ApiError> {
        let mut branches: Vec<Branch> = self
            .paginate(&format!("/repos/{}/{}/branches", owner, repo), &[], PageSpec::all(DEFAULT_PER_PAGE))
            .await?;

        let dates = join_all(branches.iter().map(|b| async move {
            if b.commit.sha.is_empty() {
                return None;
            }
            match self.get_commit(owner, repo, &b.commit.sha).await {
                Ok(commit) => commit.commit.committer.date,
                Err(e) => {
                    debug!(branch = %b.name, error = %e, "branch commit lookup failed");
                    None
                }
            }
        }))
        .await;

        for (branch, date) in branches.iter_mut().zip(dates) {
            branch.last_commit_date = date;
        }
        branches.sort_by(|a, b| b.last_commit_date.cmp(&a.last_commit_date));
        Ok(branches)
    }

    // ============ Issues ============

    /// Issues only; pull requests returned by the same endpoint are skipped.
    pub async fn get_issues(&self, owner: &str, repo: &str, state: IssueState) -> Result<Vec<Issue>, ApiError> {
        let query = [
            ("state", state.as_str().to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ];
        let items: Vec<Issue> = self
            .paginate(&format!("/repos/{}/{}/issues", owner, repo), &query, PageSpec::all(DEFAULT_PER_PAGE))
            .await?;
        Ok(items.into_iter().filter(|i| !i.is_pull_request()).collect())
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}/issues/{}", owner, repo, number)))
            .await
    }

    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue, ApiError> {
        let mut payload = json!({ "title": title, "body": body });
        if !labels.is_empty() {
            payload["labels"] = json!(labels);
        }
        let request = self
            .request(Method::Post, &format!("/repos/{}/{}/issues", owner, repo))
            .json(payload);
        self.send_for(request, &[201]).await
    }

    pub async fn update_issue(&self, owner: &str, repo: &str, number: u64, update: &IssueUpdate) -> Result<Issue, ApiError> {
        let request = self
            .request(Method::Patch, &format!("/repos/{}/{}/issues/{}", owner, repo, number))
            .json(update.to_json());
        self.send_for(request, &[200]).await
    }

    pub async fn get_issue_comments(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Comment>, ApiError> {
        self.paginate(
            &format!("/repos/{}/{}/issues/{}/comments", owner, repo, number),
            &[],
            PageSpec::all(DEFAULT_PER_PAGE),
        )
        .await
    }

    pub async fn create_issue_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<Comment, ApiError> {
        let request = self
            .request(Method::Post, &format!("/repos/{}/{}/issues/{}/comments", owner, repo, number))
            .json(json!({ "body": body }));
        self.send_for(request, &[201]).await
    }

    pub async fn delete_issue_comment(&self, owner: &str, repo: &str, comment_id: u64) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Delete, &format!("/repos/{}/{}/issues/comments/{}", owner, repo, comment_id)),
            &[204],
        )
        .await
    }

    // ============ Pull requests ============

    pub async fn get_pull_requests(&self, owner: &str, repo: &str, state: IssueState) -> Result<Vec<PullRequest>, ApiError> {
        let query = [
            ("state", state.as_str().to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ];
        self.paginate(&format!("/repos/{}/{}/pulls", owner, repo), &query, PageSpec::all(DEFAULT_PER_PAGE))
            .await
    }

    pub async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}/pulls/{}", owner, repo, number)))
            .await
    }

    pub async fn create_pull_request(&self, owner: &str, repo: &str, pr: &NewPullRequest) -> Result<PullRequest, ApiError> {
        let request = self
            .request(Method::Post, &format!("/repos/{}/{}/pulls", owner, repo))
            .json(json!({
                "title": pr.title,
                "head": pr.head,
                "base": pr.base,
                "body": pr.body,
                "draft": pr.draft,
            }));
        self.send_for(request, &[201]).await
    }

    pub async fn update_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<PullRequest, ApiError> {
        let request = self
            .request(Method::Patch, &format!("/repos/{}/{}/pulls/{}", owner, repo, number))
            .json(update.to_json());
        self.send_for(request, &[200]).await
    }

    pub async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        method: MergeMethod,
        commit_title: Option<&str>,
        commit_message: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut payload = json!({ "merge_method": method.as_str() });
        if let Some(title) = commit_title {
            payload["commit_title"] = json!(title);
        }
        if let Some(message) = commit_message {
            payload["commit_message"] = json!(message);
        }
        let request = self
            .request(Method::Put, &format!("/repos/{}/{}/pulls/{}/merge", owner, repo, number))
            .json(payload);
        self.expect_status(request, &[200]).await
    }

    // ============ Commits ============

    /// Commit history from `sha` (default branch when `None`), stopping after
    /// `max_commits` entries; 0 loads everything.
    pub async fn get_commits(
        &self,
        owner: &str,
        repo: &str,
        sha: Option<&str>,
        max_commits: usize,
    ) -> Result<Vec<Commit>, ApiError> {
        let mut query = Vec::new();
        if let Some(sha) = sha {
            query.push(("sha", sha.to_string()));
        }
        self.paginate(
            &format!("/repos/{}/{}/commits", owner, repo),
            &query,
            PageSpec::limited(DEFAULT_PER_PAGE, max_commits),
        )
        .await
    }

    pub async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Commit, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}/commits/{}", owner, repo, sha)))
            .await
    }

    // ============ Search ============

    fn search_request(&self, path: &str, query: &str, sort: &str) -> HttpRequest {
        let request = self
            .request(Method::Get, path)
            .query("q", query)
            .query("per_page", SEARCH_PER_PAGE);
        if sort == "best-match" {
            request
        } else {
            request.query("sort", sort)
        }
    }

    pub async fn search_repos(&self, query: &str, sort: &str) -> Result<Vec<Repository>, ApiError> {
        let page: SearchPage<Repository> = self
            .get_json(self.search_request("/search/repositories", query, sort))
            .await?;
        Ok(page.items)
    }

    pub async fn search_users(&self, query: &str, sort: &str) -> Result<Vec<UserProfile>, ApiError> {
        let page: SearchPage<UserProfile> = self
            .get_json(self.search_request("/search/users", query, sort))
            .await?;
        Ok(page.items)
    }

    // ============ Actions ============

    pub async fn get_workflows(&self, owner: &str, repo: &str) -> Result<Vec<Workflow>, ApiError> {
        self.paginate_inner(
            &format!("/repos/{}/{}/actions/workflows", owner, repo),
            &[],
            PageSpec::all(DEFAULT_PER_PAGE),
            Some("workflows"),
        )
        .await
    }

    /// Most recent runs (one page), optionally narrowed to one workflow.
    pub async fn get_workflow_runs(&self, owner: &str, repo: &str, filter: &RunFilter) -> Result<Vec<WorkflowRun>, ApiError> {
        let path = match filter.workflow_id {
            Some(id) => format!("/repos/{}/{}/actions/workflows/{}/runs", owner, repo, id),
            None => format!("/repos/{}/{}/actions/runs", owner, repo),
        };
        let mut request = self.request(Method::Get, &path).query("per_page", RUNS_PER_PAGE);
        if let Some(branch) = &filter.branch {
            request = request.query("branch", branch);
        }
        if let Some(status) = &filter.status {
            request = request.query("status", status);
        }
        let body: Value = self.get_json(request).await?;
        let runs = body.get("workflow_runs").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
        Ok(serde_json::from_value(runs)?)
    }

    pub async fn get_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> Result<WorkflowRun, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}/actions/runs/{}", owner, repo, run_id)))
            .await
    }

    pub async fn get_workflow_run_jobs(&self, owner: &str, repo: &str, run_id: u64) -> Result<Vec<WorkflowJob>, ApiError> {
        self.paginate_inner(
            &format!("/repos/{}/{}/actions/runs/{}/jobs", owner, repo, run_id),
            &[],
            PageSpec::all(DEFAULT_PER_PAGE),
            Some("jobs"),
        )
        .await
    }

    pub async fn rerun_workflow(&self, owner: &str, repo: &str, run_id: u64) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Post, &format!("/repos/{}/{}/actions/runs/{}/rerun", owner, repo, run_id)),
            &[201],
        )
        .await
    }

    pub async fn rerun_failed_jobs(&self, owner: &str, repo: &str, run_id: u64) -> Result<(), ApiError> {
        self.expect_status(
            self.request(
                Method::Post,
                &format!("/repos/{}/{}/actions/runs/{}/rerun-failed-jobs", owner, repo, run_id),
            ),
            &[201],
        )
        .await
    }

    pub async fn cancel_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Post, &format!("/repos/{}/{}/actions/runs/{}/cancel", owner, repo, run_id)),
            &[202],
        )
        .await
    }

    /// Short-lived archive URL for a run's logs, read from the 302 `Location`.
    pub async fn get_workflow_run_logs_url(&self, owner: &str, repo: &str, run_id: u64) -> Result<String, ApiError> {
        let request = self
            .request(Method::Get, &format!("/repos/{}/{}/actions/runs/{}/logs", owner, repo, run_id))
            .no_redirects();
        let path = request.path();
        let response = self.send(request).await?;
        match (response.status, response.header("location")) {
            (302, Some(location)) => Ok(location.to_string()),
            (status, _) => Err(ApiError::Status { status, path }),
        }
    }

    pub async fn get_job_logs(&self, owner: &str, repo: &str, job_id: u64) -> Result<String, ApiError> {
        let request = self.request(Method::Get, &format!("/repos/{}/{}/actions/jobs/{}/logs", owner, repo, job_id));
        let path = request.path();
        let response = self.send(request).await?;
        if response.status != 200 {
            return Err(ApiError::Status {
                status: response.status,
                path,
            });
        }
        Ok(response.text())
    }

    // ============ Releases ============

    pub async fn get_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>, ApiError> {
        self.paginate(&format!("/repos/{}/{}/releases", owner, repo), &[], PageSpec::all(RELEASES_PER_PAGE))
            .await
    }

    pub async fn get_release(&self, owner: &str, repo: &str, release_id: u64) -> Result<Release, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}/releases/{}", owner, repo, release_id)))
            .await
    }

    pub async fn get_latest_release(&self, owner: &str, repo: &str) -> Result<Release, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}/releases/latest", owner, repo)))
            .await
    }

    pub async fn get_release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Release, ApiError> {
        self.get_json(self.request(Method::Get, &format!("/repos/{}/{}/releases/tags/{}", owner, repo, tag)))
            .await
    }

    /// Streams a release asset into `sink`, reporting `(downloaded, total)`.
    pub async fn download_asset(
        &self,
        owner: &str,
        repo: &str,
        asset_id: u64,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: ProgressFn<'_>,
    ) -> Result<u64, ApiError> {
        let mut request = self.request(
            Method::Get,
            &format!("/repos/{}/{}/releases/assets/{}", owner, repo, asset_id),
        );
        request.headers.retain(|(k, _)| k != "Accept");
        let request = request.header("Accept", "application/octet-stream");
        self.transport.download(request, sink, progress).await
    }

    // ============ Notifications ============

    fn notification_query(all: bool, participating: bool) -> [(&'static str, String); 2] {
        [("all", all.to_string()), ("participating", participating.to_string())]
    }

    /// Every page of notification threads, or an error.
    pub async fn get_notifications(&self, all: bool, participating: bool) -> Result<Vec<Notification>, ApiError> {
        self.paginate(
            "/notifications",
            &Self::notification_query(all, participating),
            PageSpec::all(NOTIFICATIONS_PER_PAGE).complete(),
        )
        .await
    }

    pub async fn get_repo_notifications(
        &self,
        owner: &str,
        repo: &str,
        all: bool,
        participating: bool,
    ) -> Result<Vec<Notification>, ApiError> {
        self.paginate(
            &format!("/repos/{}/{}/notifications", owner, repo),
            &Self::notification_query(all, participating),
            PageSpec::all(NOTIFICATIONS_PER_PAGE),
        )
        .await
    }

    fn last_read_body(last_read_at: Option<DateTime<Utc>>) -> Value {
        match last_read_at {
            Some(t) => json!({ "last_read_at": t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true) }),
            None => json!({}),
        }
    }

    pub async fn mark_notifications_read(&self, last_read_at: Option<DateTime<Utc>>) -> Result<(), ApiError> {
        let request = self
            .request(Method::Put, "/notifications")
            .json(Self::last_read_body(last_read_at));
        self.expect_status(request, &[202, 205]).await
    }

    pub async fn mark_repo_notifications_read(
        &self,
        owner: &str,
        repo: &str,
        last_read_at: Option<DateTime<Utc>>,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::Put, &format!("/repos/{}/{}/notifications", owner, repo))
            .json(Self::last_read_body(last_read_at));
        self.expect_status(request, &[202, 205]).await
    }

    pub async fn mark_thread_read(&self, thread_id: &str) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Patch, &format!("/notifications/threads/{}", thread_id)),
            &[200, 205],
        )
        .await
    }

    pub async fn mark_thread_done(&self, thread_id: &str) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Delete, &format!("/notifications/threads/{}", thread_id)),
            &[204],
        )
        .await
    }

    pub async fn get_thread_subscription(&self, thread_id: &str) -> Result<ThreadSubscription, ApiError> {
        self.get_json(self.request(
            Method::Get,
            &format!("/notifications/threads/{}/subscription", thread_id),
        ))
        .await
    }

    pub async fn subscribe_to_thread(&self, thread_id: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::Put, &format!("/notifications/threads/{}/subscription", thread_id))
            .json(json!({ "subscribed": true }));
        self.expect_status(request, &[200]).await
    }

    pub async fn unsubscribe_from_thread(&self, thread_id: &str) -> Result<(), ApiError> {
        self.expect_status(
            self.request(Method::Delete, &format!("/notifications/threads/{}/subscription", thread_id)),
            &[204],
        )
        .await
    }

    pub async fn mute_thread(&self, thread_id: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::Put, &format!("/notifications/threads/{}/subscription", thread_id))
            .json(json!({ "ignored": true }));
        self.expect_status(request, &[200]).await
    }

    // ============ Events ============

    /// The user's received-events feed, capped at three pages of 100. Any
    /// failing page fails the fetch.
    pub async fn get_received_events(&self, username: &str) -> Result<Vec<Event>, ApiError> {
        self.paginate(
            &format!("/users/{}/received_events", username),
            &[],
            PageSpec::pages(DEFAULT_PER_PAGE, RECEIVED_EVENTS_MAX_PAGES).complete(),
        )
        .await
    }

    async fn single_page_events(&self, path: &str) -> Result<Vec<Event>, ApiError> {
        self.get_json(self.request(Method::Get, path).query("per_page", EVENTS_PER_PAGE))
            .await
    }

    pub async fn get_user_events(&self, username: &str) -> Result<Vec<Event>, ApiError> {
        self.single_page_events(&format!("/users/{}/events", username)).await
    }

    pub async fn get_repo_events(&self, owner: &str, repo: &str) -> Result<Vec<Event>, ApiError> {
        self.single_page_events(&format!("/repos/{}/{}/events", owner, repo)).await
    }

    pub async fn get_org_events(&self, org: &str) -> Result<Vec<Event>, ApiError> {
        self.single_page_events(&format!("/orgs/{}/events", org)).await
    }

    // ============ Contents ============

    /// Directory listing at `path`; a file path yields a single entry.
    pub async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<ContentItem>, ApiError> {
        let path = path.trim_start_matches('/');
        let mut request = self.request(Method::Get, &format!("/repos/{}/{}/contents/{}", owner, repo, path));
        if let Some(r) = git_ref {
            request = request.query("ref", r);
        }
        let body: Value = self.get_json(request).await?;
        if body.is_array() {
            Ok(serde_json::from_value(body)?)
        } else {
            Ok(vec![serde_json::from_value(body)?])
        }
    }

    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, ApiError> {
        let items = self.get_contents(owner, repo, path, git_ref).await?;
        items
            .into_iter()
            .find(|item| !item.is_dir())
            .and_then(|item| item.decoded_text())
            .ok_or_else(|| ApiError::Decode(format!("{} is not a file with inline content", path)))
    }
}

fn sort_by_updated_desc(repos: &mut [Repository]) {
    // None compares lowest, so undated repositories land at the end.
    repos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
