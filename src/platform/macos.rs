use std::env;
use std::path::PathBuf;

pub fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
}

pub fn config_dir() -> PathBuf {
    home_dir().join("Library/Application Support/GitDesk")
}
