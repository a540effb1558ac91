use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::User;
use super::{null_default, relative_time_short};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationSubject {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    /// Issue, PullRequest, Commit, Release, Discussion, ...
    #[serde(default, rename = "type")]
    pub kind: String,
    pub latest_comment_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationRepository {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub owner: User,
}

/// A notification thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub subject: NotificationSubject,
    #[serde(default)]
    pub repository: NotificationRepository,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
}

impl Notification {
    pub fn repository_full_name(&self) -> &str {
        &self.repository.full_name
    }

    pub fn reason_display(&self) -> &str {
        match self.reason.as_str() {
            "assign" => "You were assigned",
            "author" => "You created the thread",
            "comment" => "You commented",
            "ci_activity" => "CI activity",
            "invitation" => "You were invited",
            "manual" => "You subscribed manually",
            "mention" => "You were @mentioned",
            "review_requested" => "Review requested",
            "security_alert" => "Security alert",
            "state_change" => "State changed",
            "subscribed" => "You're watching the repo",
            "team_mention" => "Your team was @mentioned",
            other => other,
        }
    }

    fn kind_label(&self) -> &str {
        match self.subject.kind.as_str() {
            "PullRequest" => "PR",
            "Discussion" => "Disc",
            "RepositoryVulnerabilityAlert" => "Security",
            other => other,
        }
    }

    pub fn format_display(&self, now: DateTime<Utc>) -> String {
        let marker = if self.unread { "● " } else { "○ " };
        let when = self
            .updated_at
            .map(|t| relative_time_short(t, now))
            .unwrap_or_else(|| "Unknown".to_string());
        format!(
            "{}[{}] {} - {} ({}) - {}",
            marker,
            self.kind_label(),
            self.subject.title,
            self.repository_full_name(),
            self.reason_display(),
            when
        )
    }

    /// Browser URL for the subject, derived from its API URL.
    pub fn web_url(&self) -> String {
        if self.subject.url.is_empty() {
            return format!("https://github.com/{}", self.repository_full_name());
        }
        self.subject
            .url
            .replace("api.github.com/repos", "github.com")
            .replace("/pulls/", "/pull/")
    }
}

/// Subscription state of a notification thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThreadSubscription {
    #[serde(default)]
    pub subscribed: bool,
    #[serde(default)]
    pub ignored: bool,
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
