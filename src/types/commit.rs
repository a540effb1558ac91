use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::User;
use super::{null_default, relative_time_long};

/// Git signature; not necessarily linked to a GitHub account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Signature {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub email: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CommitDetail {
    #[serde(default, deserialize_with = "null_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_default")]
    pub author: Signature,
    #[serde(default, deserialize_with = "null_default")]
    pub committer: Signature,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CommitParent {
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CommitStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitFile {
    pub filename: String,
    #[serde(default = "modified")]
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
    pub previous_filename: Option<String>,
}

fn modified() -> String {
    "modified".to_string()
}

impl CommitFile {
    pub fn format_display(&self) -> String {
        let icon = match self.status.as_str() {
            "added" => "[A]",
            "removed" => "[D]",
            "modified" | "changed" => "[M]",
            "renamed" => "[R]",
            "copied" => "[C]",
            "unchanged" => "[ ]",
            _ => "[?]",
        };
        let stats = format!("+{} -{}", self.additions, self.deletions);
        match (&self.previous_filename, self.status.as_str()) {
            (Some(prev), "renamed") => format!("{} {} -> {} ({})", icon, prev, self.filename, stats),
            _ => format!("{} {} ({})", icon, self.filename, stats),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub commit: CommitDetail,
    /// Linked GitHub account of the author, if any.
    pub author: Option<User>,
    pub committer: Option<User>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub parents: Vec<CommitParent>,
    #[serde(default)]
    pub stats: CommitStats,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

impl Commit {
    pub fn message(&self) -> &str {
        &self.commit.message
    }

    pub fn short_sha(&self) -> &str {
        let end = self.sha.char_indices().nth(7).map(|(i, _)| i).unwrap_or(self.sha.len());
        &self.sha[..end]
    }

    pub fn first_line(&self) -> &str {
        self.commit.message.lines().next().unwrap_or("")
    }

    pub fn format_display(&self, now: DateTime<Utc>) -> String {
        let author = match &self.author {
            Some(user) => user.login.as_str(),
            None => self.commit.author.name.as_str(),
        };
        let date = self
            .commit
            .author
            .date
            .map(|d| relative_time_long(d, now))
            .unwrap_or_else(|| "Unknown".to_string());
        format!("{} - {}, {} [{}]", self.first_line(), author, date, self.short_sha())
    }
}
