//! Error types for speech output and recognition.

use voxpage_core::error::VoxError;

use crate::state::RecognizerState;

/// Errors from the speech output pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesis is not supported in this environment")]
    Unsupported,
    #[error("speech engine failure: {0}")]
    Engine(String),
}

/// Errors from the voice command recognizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    #[error("voice recognition is not supported in this environment")]
    Unsupported,
    #[error("recognition engine failure: {0}")]
    Engine(String),
    #[error("invalid recognizer transition: {from} -> {to}")]
    InvalidTransition {
        from: RecognizerState,
        to: RecognizerState,
    },
}

impl From<SpeechError> for VoxError {
    fn from(err: SpeechError) -> Self {
        VoxError::Speech(err.to_string())
    }
}

impl From<RecognitionError> for VoxError {
    fn from(err: RecognitionError) -> Self {
        VoxError::Recognition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_error_display() {
        assert_eq!(
            SpeechError::Engine("device lost".into()).to_string(),
            "speech engine failure: device lost"
        );
    }

    #[test]
    fn test_transition_error_mentions_states() {
        let err = RecognitionError::InvalidTransition {
            from: RecognizerState::Idle,
            to: RecognizerState::Stopping,
        };
        let msg = err.to_string();
        assert!(msg.contains("Idle"));
        assert!(msg.contains("Stopping"));
    }

    #[test]
    fn test_conversion_into_vox_error() {
        let err: VoxError = RecognitionError::Unsupported.into();
        assert!(matches!(err, VoxError::Recognition(_)));
        let err: VoxError = SpeechError::Unsupported.into();
        assert!(matches!(err, VoxError::Speech(_)));
    }
}
