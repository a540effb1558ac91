use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_default;

/// Minimal GitHub user reference embedded in other records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(default = "unknown_login", deserialize_with = "null_default")]
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub avatar_url: String,
}

fn unknown_login() -> String {
    "unknown".to_string()
}

impl Default for User {
    fn default() -> Self {
        Self {
            login: unknown_login(),
            id: 0,
            avatar_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Label {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
}

/// A comment on an issue or pull request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_default")]
    pub user: User,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
}

/// A GitHub issue. The issues endpoint also returns pull requests; those carry
/// a `pull_request` member and are filtered out by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default = "open_state")]
    pub state: String,
    #[serde(default, deserialize_with = "null_default")]
    pub user: User,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignees: Vec<User>,
    #[serde(default, rename = "comments")]
    pub comments_count: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

fn open_state() -> String {
    "open".to_string()
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    pub fn format_display(&self) -> String {
        let state = if self.is_open() { "[Open]" } else { "[Closed]" };
        let labels = if self.labels.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = self.labels.iter().map(|l| l.name.as_str()).collect();
            format!(" [{}]", names.join(", "))
        };
        format!("#{} {} {}{} - by {}", self.number, state, self.title, labels, self.user.login)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BranchRef {
    #[serde(default, rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default = "open_state")]
    pub state: String,
    #[serde(default, deserialize_with = "null_default")]
    pub user: User,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignees: Vec<User>,
    #[serde(default, deserialize_with = "null_default")]
    pub head: BranchRef,
    #[serde(default, deserialize_with = "null_default")]
    pub base: BranchRef,
    #[serde(default, deserialize_with = "null_default")]
    pub merged: bool,
    pub mergeable: Option<bool>,
    pub mergeable_state: Option<String>,
    pub merged_by: Option<User>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "comments")]
    pub comments_count: u64,
    #[serde(default, rename = "commits")]
    pub commits_count: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub draft: bool,
}

impl PullRequest {
    pub fn head_ref(&self) -> &str {
        &self.head.ref_name
    }

    pub fn base_ref(&self) -> &str {
        &self.base.ref_name
    }

    pub fn format_display(&self) -> String {
        let state = if self.merged {
            "[Merged]"
        } else if self.state == "open" {
            if self.draft { "[Draft]" } else { "[Open]" }
        } else {
            "[Closed]"
        };
        format!(
            "#{} {} {} ({} -> {}) - by {}",
            self.number,
            state,
            self.title,
            self.head_ref(),
            self.base_ref(),
            self.user.login
        )
    }
}

/// State filter for issue and pull request listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueState {
    #[default]
    Open,
    Closed,
    All,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
            IssueState::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}
