use serde::{Deserialize, Serialize};

use crate::platform;

/// Default single-line template used when listing repositories.
pub const DEFAULT_REPO_TEMPLATE: &str = "$full_name$ - $description$ | Stars: $stars$ | Forks: $forks$ | Issues: $open_issues$ | $language$ | Updated $updated_at$";

/// Top-level application settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub general: GeneralSettings,
    pub paths: PathSettings,
    pub notifications: NotificationSettings,
    pub refresh: RefreshSettings,
}

/// General client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralSettings {
    /// Number of configured account slots.
    pub accounts: usize,
    pub dark_mode: DarkMode,
    pub window_shown: bool,
    pub repo_template: String,
    /// Maximum commits to load per history view, 0 loads everything.
    pub commit_limit: usize,
    pub global_hotkey: String,
    pub check_for_updates: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            accounts: 1,
            dark_mode: DarkMode::Off,
            window_shown: true,
            repo_template: DEFAULT_REPO_TEMPLATE.to_string(),
            commit_limit: 0,
            global_hotkey: "control+alt+g".to_string(),
            check_for_updates: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DarkMode {
    Off,
    On,
    Auto,
}

/// Filesystem locations for downloads and git checkouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub download_location: String,
    pub git_path: String,
    /// Clone into `<git_path>/<owner>/<repo>` instead of `<git_path>/<repo>`.
    pub git_use_org_structure: bool,
    pub git_clone_recursive: bool,
}

impl Default for PathSettings {
    fn default() -> Self {
        let home = platform::get_home_dir();
        Self {
            download_location: home.join("Downloads").to_string_lossy().to_string(),
            git_path: home.join("git").to_string_lossy().to_string(),
            git_use_org_structure: false,
            git_clone_recursive: false,
        }
    }
}

/// Per-stream desktop notification toggles. All off by default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NotificationSettings {
    pub activity: bool,
    pub notifications: bool,
    pub starred: bool,
    pub watched: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RefreshSettings {
    /// Minutes between automatic refreshes, 0 disables.
    pub auto_refresh_interval_minutes: u64,
}
