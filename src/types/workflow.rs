use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::User;
use super::null_default;

/// A GitHub Actions workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// `active`, `disabled_manually`, ...
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub badge_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub workflow_id: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub head_branch: String,
    #[serde(default)]
    pub head_sha: String,
    /// `queued`, `in_progress` or `completed`.
    #[serde(default)]
    pub status: String,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub run_number: u64,
    #[serde(default = "first_attempt")]
    pub run_attempt: u64,
    #[serde(default)]
    pub html_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub actor: Option<User>,
    pub triggering_actor: Option<User>,
}

fn first_attempt() -> u64 {
    1
}

impl WorkflowRun {
    pub fn short_sha(&self) -> &str {
        let end = self.head_sha.char_indices().nth(7).map(|(i, _)| i).unwrap_or(self.head_sha.len());
        &self.head_sha[..end]
    }

    pub fn actor_login(&self) -> &str {
        self.actor.as_ref().map(|a| a.login.as_str()).unwrap_or("")
    }

    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    /// Conclusion for finished runs, humanized status otherwise.
    pub fn status_text(&self) -> String {
        if self.is_completed() {
            self.conclusion.clone().unwrap_or_else(|| "completed".to_string())
        } else {
            self.status.replace('_', " ")
        }
    }

    pub fn format_display(&self) -> String {
        format!(
            "[{}] {} #{} - {} ({})",
            self.status_text(),
            self.name,
            self.run_number,
            self.head_branch,
            self.event
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowJob {
    pub id: u64,
    #[serde(default)]
    pub run_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    pub runner_name: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowJob {
    pub fn status_text(&self) -> String {
        if self.status == "completed" {
            self.conclusion.clone().unwrap_or_else(|| "completed".to_string())
        } else {
            self.status.replace('_', " ")
        }
    }
}
