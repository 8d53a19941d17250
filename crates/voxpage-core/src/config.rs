use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoxError};

/// Top-level configuration for voxpage.
///
/// Loaded from `~/.voxpage/config.toml` by default. Each section corresponds
/// to one execution context or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoxConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub reading: ReadingConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl VoxConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VoxConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VoxError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Language tag prefix preferred when no voice is requested (e.g. "en-").
    pub preferred_locale_prefix: String,
    /// Rate used when a request carries no usable rate.
    pub default_rate: f32,
    /// Lower clamp for requested rates.
    pub min_rate: f32,
    /// Upper clamp for requested rates.
    pub max_rate: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            preferred_locale_prefix: "en-".to_string(),
            default_rate: 1.0,
            min_rate: 0.1,
            max_rate: 10.0,
        }
    }
}

impl SpeechConfig {
    /// Normalise a requested rate into the configured range.
    ///
    /// Non-finite and non-positive values fall back to `default_rate`.
    pub fn clamp_rate(&self, rate: f32) -> f32 {
        if !rate.is_finite() || rate <= 0.0 {
            return self.default_rate;
        }
        rate.clamp(self.min_rate, self.max_rate)
    }
}

/// Voice command recognition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Recognition language tag.
    pub language: String,
    /// Keep the recognition session open across utterances.
    pub continuous: bool,
    /// Deliver non-final hypotheses.
    pub interim_results: bool,
    /// Delay before restarting after an unexpected end, in milliseconds.
    pub restart_delay_ms: u64,
    /// Restart automatically even after a permission-denied error.
    pub restart_after_permission_denied: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: false,
            restart_delay_ms: 1000,
            restart_after_permission_denied: false,
        }
    }
}

/// Per-tab reading engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    /// CSS class applied to the element being read.
    pub highlight_class: String,
    /// Speak the ready greeting once the engine is initialised.
    pub announce_ready: bool,
    /// Delay before the ready greeting, in milliseconds.
    pub ready_announcement_delay_ms: u64,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            highlight_class: "voxpage-reading".to_string(),
            announce_ready: true,
            ready_announcement_delay_ms: 1000,
        }
    }
}

/// Background supervisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Time given to a freshly installed worker to announce readiness, in milliseconds.
    pub settle_delay_ms: u64,
    /// Stylesheets installed into a tab before the worker script.
    pub stylesheet_files: Vec<String>,
    /// Worker scripts installed into a tab.
    pub script_files: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            stylesheet_files: vec!["content/content.css".to_string()],
            script_files: vec!["content/content.js".to_string()],
        }
    }
}
