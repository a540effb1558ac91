use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::issue::User;
use super::{null_default, relative_time_short};

/// Repository reference inside an event; `name` is the full `owner/repo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventRepo {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// One entry of an activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_default")]
    pub actor: User,
    #[serde(default)]
    pub repo: EventRepo,
    #[serde(default)]
    pub payload: Value,
    #[serde(default = "public_default")]
    pub public: bool,
    pub created_at: Option<DateTime<Utc>>,
}

fn public_default() -> bool {
    true
}

fn str_at<'a>(v: &'a Value, path: &[&str]) -> &'a str {
    let mut cur = v;
    for key in path {
        cur = &cur[*key];
    }
    cur.as_str().unwrap_or("")
}

/// Renders a JSON number or string for `#N` style references.
fn num_at(v: &Value, path: &[&str]) -> String {
    let mut cur = v;
    for key in path {
        cur = &cur[*key];
    }
    match cur {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

impl Event {
    /// Human-readable description of what the actor did.
    pub fn action_description(&self) -> String {
        let p = &self.payload;
        match self.kind.as_str() {
            "WatchEvent" => "starred".to_string(),
            "ForkEvent" => match str_at(p, &["forkee", "full_name"]) {
                "" => "forked".to_string(),
                name => format!("forked to {}", name),
            },
            "CreateEvent" => {
                let ref_type = str_at(p, &["ref_type"]);
                let r = str_at(p, &["ref"]);
                match ref_type {
                    "repository" => "created repository".to_string(),
                    "branch" => format!("created branch {}", r),
                    "tag" => format!("created tag {}", r),
                    other => format!("created {}", other),
                }
            }
            "DeleteEvent" => format!("deleted {} {}", str_at(p, &["ref_type"]), str_at(p, &["ref"])),
            "PushEvent" => {
                // size is 0 for force pushes; fall back to distinct_size, then the commit list
                let mut size = p["size"].as_u64().unwrap_or(0);
                if size == 0 {
                    size = p["distinct_size"].as_u64().unwrap_or(0);
                }
                if size == 0 {
                    size = p["commits"].as_array().map(|c| c.len() as u64).unwrap_or(0);
                }
                let r = str_at(p, &["ref"]).trim_start_matches("refs/heads/");
                match size {
                    0 => format!("force pushed to {}", r),
                    1 => format!("pushed 1 commit to {}", r),
                    n => format!("pushed {} commits to {}", n, r),
                }
            }
            "IssuesEvent" => format!(
                "{} issue #{}: {}",
                str_at(p, &["action"]),
                num_at(p, &["issue", "number"]),
                truncate(str_at(p, &["issue", "title"]), 50)
            ),
            "IssueCommentEvent" => format!("commented on issue #{}", num_at(p, &["issue", "number"])),
            "PullRequestEvent" => {
                let action = str_at(p, &["action"]);
                let number = num_at(p, &["pull_request", "number"]);
                let title = truncate(str_at(p, &["pull_request", "title"]), 50);
                match action {
                    "opened" => format!("opened PR #{}: {}", number, title),
                    "closed" if p["pull_request"]["merged"].as_bool().unwrap_or(false) => {
                        format!("merged PR #{}: {}", number, title)
                    }
                    "closed" => format!("closed PR #{}: {}", number, title),
                    other => format!("{} PR #{}", other, number),
                }
            }
            "PullRequestReviewEvent" => {
                let number = num_at(p, &["pull_request", "number"]);
                match str_at(p, &["review", "state"]) {
                    "approved" => format!("approved PR #{}", number),
                    "changes_requested" => format!("requested changes on PR #{}", number),
                    _ => format!("reviewed PR #{}", number),
                }
            }
            "PullRequestReviewCommentEvent" => {
                format!("commented on PR #{}", num_at(p, &["pull_request", "number"]))
            }
            "ReleaseEvent" => {
                let tag = str_at(p, &["release", "tag_name"]);
                match str_at(p, &["action"]) {
                    "published" => format!("released {}", tag),
                    other => format!("{} release {}", other, tag),
                }
            }
            "CommitCommentEvent" => "commented on a commit".to_string(),
            "GollumEvent" => match p["pages"].as_array().and_then(|pages| pages.first()) {
                Some(page) => {
                    let action = page["action"].as_str().unwrap_or("updated");
                    format!("{} wiki page: {}", action, page["title"].as_str().unwrap_or(""))
                }
                None => "updated wiki".to_string(),
            },
            "MemberEvent" => format!(
                "{} {} as collaborator",
                str_at(p, &["action"]),
                str_at(p, &["member", "login"])
            ),
            "PublicEvent" => "made repository public".to_string(),
            "SponsorshipEvent" => "sponsorship".to_string(),
            other => other.to_string(),
        }
    }

    pub fn format_display(&self, now: DateTime<Utc>) -> String {
        let when = self
            .created_at
            .map(|t| relative_time_short(t, now))
            .unwrap_or_else(|| "Unknown".to_string());
        format!(
            "{} {} in {} - {}",
            self.actor.login,
            self.action_description(),
            self.repo.name,
            when
        )
    }

    /// Best browser URL for the event, falling back to the repository page.
    pub fn web_url(&self) -> String {
        let base = format!("https://github.com/{}", self.repo.name);
        let p = &self.payload;
        let candidate = match self.kind.as_str() {
            "IssuesEvent" => non_empty(num_at(p, &["issue", "number"])).map(|n| format!("{}/issues/{}", base, n)),
            "IssueCommentEvent" => non_empty(str_at(p, &["comment", "html_url"]).to_string()).or_else(|| {
                non_empty(num_at(p, &["issue", "number"])).map(|n| format!("{}/issues/{}", base, n))
            }),
            "PullRequestEvent" | "PullRequestReviewEvent" | "PullRequestReviewCommentEvent" => {
                non_empty(num_at(p, &["pull_request", "number"])).map(|n| format!("{}/pull/{}", base, n))
            }
            "PushEvent" => {
                let before = truncate(str_at(p, &["before"]), 7);
                let head = truncate(str_at(p, &["head"]), 7);
                if before.is_empty() || head.is_empty() {
                    None
                } else {
                    Some(format!("{}/compare/{}...{}", base, before, head))
                }
            }
            "ReleaseEvent" => non_empty(str_at(p, &["release", "html_url"]).to_string()),
            "ForkEvent" => non_empty(str_at(p, &["forkee", "html_url"]).to_string()),
            "CommitCommentEvent" => non_empty(str_at(p, &["comment", "html_url"]).to_string()),
            "CreateEvent" => {
                let r = str_at(p, &["ref"]);
                match str_at(p, &["ref_type"]) {
                    "branch" if !r.is_empty() => Some(format!("{}/tree/{}", base, r)),
                    "tag" if !r.is_empty() => Some(format!("{}/releases/tag/{}", base, r)),
                    _ => None,
                }
            }
            _ => None,
        };
        candidate.unwrap_or(base)
    }

    pub fn actor_url(&self) -> String {
        format!("https://github.com/{}", self.actor.login)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
