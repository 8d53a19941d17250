//! Persisted user preferences.
//!
//! The preference store is owned by the control surface; the engine only
//! reads it to build [`ReadingSettings`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{Result, VoxError};
use crate::types::ReadingSettings;

pub const KEY_SELECTED_VOICE: &str = "selectedVoice";
pub const KEY_SELECTED_VOICE_LANG: &str = "selectedVoiceLang";
pub const KEY_SPEECH_RATE: &str = "speechRate";

/// Key-value preference storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store, used by tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| VoxError::Preferences(format!("Preference mutex poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| VoxError::Preferences(format!("Preference mutex poisoned: {}", e)))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON-file backed store. Every write rewrites the whole file.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFilePreferences {
    /// Open the store, starting empty if the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        debug!(path = %self.path.display(), "Preferences written");
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| VoxError::Preferences(format!("Preference mutex poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| VoxError::Preferences(format!("Preference mutex poisoned: {}", e)))?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

impl ReadingSettings {
    /// Build settings from stored preferences, defaulting anything missing
    /// or unparsable.
    pub fn from_preferences(store: &dyn PreferenceStore) -> Result<Self> {
        let mut settings = ReadingSettings::default();
        if let Some(rate) = store.get(KEY_SPEECH_RATE)? {
            match rate.trim().parse::<f32>() {
                Ok(r) => settings.rate = r,
                Err(_) => debug!(value = %rate, "Ignoring unparsable stored speech rate"),
            }
        }
        settings.voice = store.get(KEY_SELECTED_VOICE)?.filter(|v| !v.is_empty());
        settings.voice_lang = store.get(KEY_SELECTED_VOICE_LANG)?.filter(|v| !v.is_empty());
        Ok(settings)
    }
}
