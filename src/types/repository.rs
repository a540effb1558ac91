use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::issue::User;
use super::{null_default, relative_time_long};

/// Permission flags the API attaches to repositories the caller can see.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RepoPermissions {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub pull: bool,
}

/// The caller's effective access level on a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Admin,
    Write,
    Read,
}

impl Permission {
    pub fn from_flags(flags: &RepoPermissions) -> Option<Self> {
        if flags.admin {
            Some(Permission::Admin)
        } else if flags.push {
            Some(Permission::Write)
        } else if flags.pull {
            Some(Permission::Read)
        } else {
            None
        }
    }

    pub fn can_merge(&self) -> bool {
        matches!(self, Permission::Admin | Permission::Write)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub owner: User,
    #[serde(default, rename = "stargazers_count")]
    pub stars: u64,
    #[serde(default, rename = "forks_count")]
    pub forks: u64,
    #[serde(default, rename = "open_issues_count")]
    pub open_issues: u64,
    pub language: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub permissions: Option<RepoPermissions>,
}

impl Repository {
    pub fn permission(&self) -> Option<Permission> {
        self.permissions.as_ref().and_then(Permission::from_flags)
    }

    /// `pushed_at` in a stable serialized form, empty when the repo was never pushed.
    pub fn pushed_at_key(&self) -> String {
        self.pushed_at.map(|t| t.to_rfc3339()).unwrap_or_default()
    }

    pub fn format_single_line(&self) -> String {
        let lang = self.language.as_deref().unwrap_or("Unknown");
        let pushed = match self.pushed_at {
            Some(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            None => "Unknown".to_string(),
        };
        format!("{} | {} stars | {} | Pushed {}", self.full_name, self.stars, lang, pushed)
    }

    /// Expands `$placeholder$` tokens in a user-defined list template.
    pub fn render_template(&self, template: &str, now: DateTime<Utc>) -> String {
        let rel = |t: Option<DateTime<Utc>>| match t {
            Some(t) => relative_time_long(t, now),
            None => "Unknown".to_string(),
        };
        template
            .replace("$full_name$", &self.full_name)
            .replace("$name$", &self.name)
            .replace("$owner$", &self.owner.login)
            .replace("$description$", self.description.as_deref().unwrap_or("No description"))
            .replace("$stars$", &self.stars.to_string())
            .replace("$forks$", &self.forks.to_string())
            .replace("$open_issues$", &self.open_issues.to_string())
            .replace("$language$", self.language.as_deref().unwrap_or("Unknown"))
            .replace("$updated_at$", &rel(self.updated_at))
            .replace("$pushed_at$", &rel(self.pushed_at))
            .replace("$clone_url$", &self.clone_url)
            .replace("$private$", if self.private { "Private" } else { "Public" })
    }
}

/// A branch, optionally annotated with the date of its head commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub commit: BranchCommit,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub last_commit_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BranchCommit {
    #[serde(default)]
    pub sha: String,
}
