use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::format_size;

/// A file, directory, symlink or submodule entry from the contents API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default = "file_kind", rename = "type")]
    pub kind: String,
    pub download_url: Option<String>,
    #[serde(default)]
    pub html_url: String,
    /// Base64 body, present only when a single file is requested.
    pub content: Option<String>,
    pub encoding: Option<String>,
}

fn file_kind() -> String {
    "file".to_string()
}

impl ContentItem {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }

    pub fn display_name(&self) -> String {
        if self.is_dir() {
            format!("[{}]", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn size_str(&self) -> String {
        if self.is_dir() {
            String::new()
        } else {
            format_size(self.size)
        }
    }

    /// Decodes an inline base64 body; the API wraps it at 60 columns.
    pub fn decoded_text(&self) -> Option<String> {
        let raw = self.content.as_deref()?;
        if self.encoding.as_deref().unwrap_or("base64") != "base64" {
            return Some(raw.to_string());
        }
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(compact).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
