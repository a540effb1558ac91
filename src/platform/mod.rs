//! Where GitDesk keeps its state: `settings.json` plus one `account<N>/`
//! directory per credential slot, all under the config directory.

use std::env;
use std::path::PathBuf;

#[cfg(target_os = "linux")]
#[path = "linux.rs"]
mod os;

#[cfg(target_os = "macos")]
#[path = "macos.rs"]
mod os;

#[cfg(target_os = "windows")]
#[path = "windows.rs"]
mod os;

/// Relocates all state when set (portable installs, tests).
pub const HOME_OVERRIDE_VAR: &str = "GITDESK_HOME";

/// `$GITDESK_HOME`, else the OS convention: `$XDG_CONFIG_HOME/gitdesk` or
/// `~/.config/gitdesk` on Linux, `~/Library/Application Support/GitDesk` on
/// macOS, `%APPDATA%\GitDesk` on Windows.
pub fn get_config_dir() -> PathBuf {
    match env::var_os(HOME_OVERRIDE_VAR) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => os::config_dir(),
    }
}

/// Base for the default clone and download paths.
pub fn get_home_dir() -> PathBuf {
    os::home_dir()
}
