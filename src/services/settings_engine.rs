//! `settings.json` preference store with dot-notation access to single values.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::AppSettings;

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AppSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &AppSettings;
    fn get_value(&self, key: &str) -> Option<Value>;
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &Path;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: PathBuf,
    settings: AppSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses `settings.json` in the platform config directory.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let config_path =
            path_override.unwrap_or_else(|| platform::get_config_dir().join("settings.json"));
        Self {
            config_path,
            settings: AppSettings::default(),
        }
    }

    /// Reads `key`, deserialized into `T`, falling back to `default` when the key
    /// is missing or holds a value of the wrong shape.
    pub fn get_or<T: serde::de::DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_value(key) {
            Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
                warn!(key, error = %e, "setting has unexpected type, using default");
                default
            }),
            None => default,
        }
    }
}

/// `"a.b.c"` as the JSON pointer `"/a/b/c"`. `None` for an empty key or segment.
fn key_pointer(key: &str) -> Option<String> {
    if key.is_empty() || key.split('.').any(str::is_empty) {
        return None;
    }
    Some(key.split('.').map(|part| format!("/{}", part.replace('~', "~0"))).collect())
}

fn io_err(context: &str, e: std::io::Error) -> SettingsError {
    SettingsError::IoError(format!("{}: {}", context, e))
}

fn json_err(context: &str, e: serde_json::Error) -> SettingsError {
    SettingsError::SerializationError(format!("{}: {}", context, e))
}

impl SettingsEngineTrait for SettingsEngine {
    /// A missing file yields defaults. Fields absent from an older file take
    /// their default values; a malformed file is an error.
    fn load(&mut self) -> Result<AppSettings, SettingsError> {
        self.settings = match fs::read_to_string(&self.config_path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| json_err("parse settings.json", e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
            Err(e) => return Err(io_err("read settings.json", e)),
        };
        debug!(path = %self.config_path.display(), "loaded settings");
        Ok(self.settings.clone())
    }

    /// Writes through a sibling temp file and renames it over the old one.
    fn save(&self) -> Result<(), SettingsError> {
        if let Some(dir) = self.config_path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_err("create config directory", e))?;
        }
        let text = serde_json::to_string_pretty(&self.settings).map_err(|e| json_err("encode settings", e))?;
        let staging = self.config_path.with_extension("json.tmp");
        fs::write(&staging, text).map_err(|e| io_err("write settings", e))?;
        fs::rename(&staging, &self.config_path).map_err(|e| io_err("replace settings.json", e))
    }

    fn get_settings(&self) -> &AppSettings {
        &self.settings
    }

    /// `"notifications.starred"` style lookup.
    fn get_value(&self, key: &str) -> Option<Value> {
        let pointer = key_pointer(key)?;
        serde_json::to_value(&self.settings).ok()?.pointer(&pointer).cloned()
    }

    /// Replaces one existing leaf and saves. The in-memory settings change only
    /// if the edited document still deserializes.
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        let pointer =
            key_pointer(key).ok_or_else(|| SettingsError::InvalidKey(format!("malformed key '{}'", key)))?;
        let (parent, leaf) = pointer.rsplit_once('/').unwrap_or(("", pointer.as_str()));
        let leaf = leaf.replace("~0", "~");

        let mut document = serde_json::to_value(&self.settings).map_err(|e| json_err("encode settings", e))?;
        match document.pointer_mut(parent) {
            Some(Value::Object(map)) if map.contains_key(&leaf) => {
                map.insert(leaf, value);
            }
            Some(Value::Object(_)) | None => {
                return Err(SettingsError::InvalidKey(format!("no setting named '{}'", key)));
            }
            Some(_) => {
                return Err(SettingsError::InvalidKey(format!("'{}' goes through a non-object value", key)));
            }
        }

        self.settings = serde_json::from_value(document)
            .map_err(|e| SettingsError::InvalidValue(format!("'{}': {}", key, e)))?;
        self.save()?;
        debug!(key, "updated setting");
        Ok(())
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = AppSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}
