use thiserror::Error;

/// Top-level error type for the voxpage system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for VoxError` so
/// that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech output error: {0}")]
    Speech(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Reading error: {0}")]
    Reading(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Injection error: {0}")]
    Injection(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Preference error: {0}")]
    Preferences(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for VoxError {
    fn from(err: toml::de::Error) -> Self {
        VoxError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VoxError {
    fn from(err: toml::ser::Error) -> Self {
        VoxError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VoxError {
    fn from(err: serde_json::Error) -> Self {
        VoxError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for voxpage operations.
pub type Result<T> = std::result::Result<T, VoxError>;
