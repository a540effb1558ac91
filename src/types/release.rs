use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::User;
use super::{format_size, null_default};

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    pub label: Option<String>,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub browser_download_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReleaseAsset {
    pub fn format_size(&self) -> String {
        format_size(self.size)
    }

    pub fn format_display(&self) -> String {
        let downloads = if self.download_count == 1 {
            "1 download".to_string()
        } else {
            format!("{} downloads", self.download_count)
        };
        format!("{} ({}, {})", self.name, self.format_size(), downloads)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub body: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tarball_url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub zipball_url: String,
    pub author: Option<User>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Release title, falling back to the tag for unnamed releases.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.tag_name
        } else {
            &self.name
        }
    }

    pub fn author_login(&self) -> &str {
        self.author.as_ref().map(|a| a.login.as_str()).unwrap_or("")
    }

    pub fn format_display(&self) -> String {
        let mut flags = Vec::new();
        if self.draft {
            flags.push("Draft");
        }
        if self.prerelease {
            flags.push("Pre-release");
        }
        let suffix = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        format!("{} ({}){}", self.display_name(), self.tag_name, suffix)
    }
}
