use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Browser tab identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TabId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Unix timestamp in seconds (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

// =============================================================================
// Voices
// =============================================================================

/// A synthesis voice offered by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Platform voice name, used as the voice identifier.
    pub name: String,
    /// BCP 47 language tag, e.g. "en-US".
    pub lang: String,
    /// Whether the platform marks this voice as its default.
    #[serde(default)]
    pub is_default: bool,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            is_default: false,
        }
    }
}

// =============================================================================
// Reading settings
// =============================================================================

fn default_rate() -> f32 {
    1.0
}

/// Speech settings carried by `startReading` requests.
///
/// `rate` accepts either a JSON number or a numeric string, since range
/// inputs report their value as text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingSettings {
    #[serde(default = "default_rate", deserialize_with = "deserialize_rate")]
    pub rate: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(rename = "voiceLang", default, skip_serializing_if = "Option::is_none")]
    pub voice_lang: Option<String>,
}

impl Default for ReadingSettings {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            voice: None,
            voice_lang: None,
        }
    }
}

impl ReadingSettings {
    pub fn with_rate(rate: f32) -> Self {
        Self {
            rate,
            ..Self::default()
        }
    }

    /// The requested voice name, treating an empty selection as "no preference".
    pub fn requested_voice(&self) -> Option<&str> {
        self.voice.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// The requested voice language, treating an empty value as absent.
    pub fn requested_lang(&self) -> Option<&str> {
        self.voice_lang.as_deref().filter(|v| !v.trim().is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RateRepr {
    Number(f32),
    Text(String),
}

fn deserialize_rate<'de, D>(deserializer: D) -> std::result::Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    match RateRepr::deserialize(deserializer)? {
        RateRepr::Number(n) => Ok(n),
        RateRepr::Text(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|e| serde::de::Error::custom(format!("invalid rate '{}': {}", s, e))),
    }
}
