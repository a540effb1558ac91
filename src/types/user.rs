use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_default;

/// A user or organization profile. Search and following listings only
/// populate the identity fields; counts stay at zero there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub avatar_url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub html_url: String,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub public_gists: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// `User` or `Organization`.
    #[serde(default = "user_kind", rename = "type")]
    pub kind: String,
}

fn user_kind() -> String {
    "User".to_string()
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.login,
        }
    }

    pub fn is_organization(&self) -> bool {
        self.kind == "Organization"
    }

    pub fn format_display(&self) -> String {
        let mut parts = vec![self.login.clone()];
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            parts.push(format!("({})", name));
        }
        if let Some(bio) = self.bio.as_deref().filter(|b| !b.is_empty()) {
            let mut preview: String = bio.chars().take(50).collect::<String>().replace('\n', " ");
            if bio.chars().count() > 50 {
                preview.push_str("...");
            }
            parts.push(format!("- {}", preview));
        }
        parts.join(" ")
    }
}
