//! Voxpage speech crate - speech output and voice command recognition.
//!
//! Provides the speech output controller, which keeps at most one utterance
//! active and tags every completion with its reason, and the voice command
//! recognizer, which supervises unreliable platform recognition sessions
//! through a validated state machine: Idle -> Starting -> Listening -> Stopping -> Idle.

pub mod error;
pub mod mock;
pub mod output;
pub mod recognition;
pub mod state;

pub use error::{RecognitionError, SpeechError};
pub use output::{select_voice, Completion, SpeechController, SpeechEngine, Utterance, UtteranceRequest};
pub use recognition::{
    RecognitionEngine, RecognitionErrorKind, RecognitionEvent, RecognitionOptions, VoiceRecognizer,
};
pub use state::RecognizerState;
