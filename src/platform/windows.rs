use std::env;
use std::path::PathBuf;

pub fn home_dir() -> PathBuf {
    env::var_os("USERPROFILE").map_or_else(|| PathBuf::from(r"C:\Users\Default"), PathBuf::from)
}

/// `%APPDATA%\GitDesk`.
pub fn config_dir() -> PathBuf {
    env::var_os("APPDATA")
        .map_or_else(|| home_dir().join(r"AppData\Roaming"), PathBuf::from)
        .join("GitDesk")
}
