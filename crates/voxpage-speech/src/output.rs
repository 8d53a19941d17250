//! Speech output controller.
//!
//! Serializes speech to one active utterance at a time. Every call to
//! [`SpeechController::speak`] reports exactly one [`Completion`], tagged with
//! the reason the utterance ended, so callers never mistake a cancellation
//! for a natural end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use voxpage_core::config::SpeechConfig;
use voxpage_core::types::{ReadingSettings, VoiceInfo};

use crate::error::SpeechError;

// =============================================================================
// Engine seam
// =============================================================================

/// One fully resolved speech request handed to the platform engine.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub id: u64,
    pub text: String,
    pub rate: f32,
    /// `None` means the platform default voice.
    pub voice: Option<VoiceInfo>,
}

/// Platform speech synthesis.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Voices currently offered by the platform.
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Speak `request`, resolving when the utterance ends naturally.
    ///
    /// The future may be dropped mid-utterance; `halt` is then called to
    /// silence the platform.
    async fn utter(&self, request: &UtteranceRequest) -> Result<(), SpeechError>;

    /// Stop all platform output immediately.
    fn halt(&self);
}

// =============================================================================
// Completion
// =============================================================================

/// Why an utterance stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The engine finished speaking the text.
    NaturalEnd,
    /// The utterance was cancelled or preempted by a newer one.
    Canceled,
    /// The engine reported a failure.
    Failed(String),
}

/// Handle to a queued utterance.
#[derive(Debug)]
pub struct Utterance {
    id: u64,
    done: oneshot::Receiver<Completion>,
}

impl Utterance {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the utterance to end.
    pub async fn finished(self) -> Completion {
        self.done.await.unwrap_or(Completion::Canceled)
    }
}

// =============================================================================
// Voice selection
// =============================================================================

/// Pick a voice for a request.
///
/// Order: the requested name if the platform offers it; the first voice whose
/// language equals the requested language; the first voice whose language
/// starts with `preferred_prefix`; otherwise the platform default (`None`).
pub fn select_voice(
    voices: &[VoiceInfo],
    requested_name: Option<&str>,
    requested_lang: Option<&str>,
    preferred_prefix: &str,
) -> Option<VoiceInfo> {
    if let Some(name) = requested_name {
        if let Some(voice) = voices.iter().find(|v| v.name == name) {
            return Some(voice.clone());
        }
        tracing::debug!(voice = %name, "Requested voice unavailable, falling back");
    }

    if let Some(lang) = requested_lang {
        if let Some(voice) = voices.iter().find(|v| v.lang.eq_ignore_ascii_case(lang)) {
            return Some(voice.clone());
        }
    }

    if !preferred_prefix.is_empty() {
        if let Some(voice) = voices.iter().find(|v| v.lang.starts_with(preferred_prefix)) {
            return Some(voice.clone());
        }
    }

    None
}

// =============================================================================
// Controller
// =============================================================================

struct ActiveUtterance {
    id: u64,
    cancel: oneshot::Sender<()>,
}

/// Owns the single active-utterance slot for one context.
pub struct SpeechController {
    engine: Arc<dyn SpeechEngine>,
    config: SpeechConfig,
    active: Arc<Mutex<Option<ActiveUtterance>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SpeechController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechController")
            .field("config", &self.config)
            .field("is_speaking", &self.is_speaking())
            .finish()
    }
}

impl SpeechController {
    pub fn new(engine: Arc<dyn SpeechEngine>, config: SpeechConfig) -> Self {
        Self {
            engine,
            config,
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Voices offered by the underlying engine.
    pub fn voices(&self) -> Vec<VoiceInfo> {
        self.engine.voices()
    }

    /// Whether an utterance currently occupies the active slot.
    pub fn is_speaking(&self) -> bool {
        self.active.lock().expect("speech slot mutex poisoned").is_some()
    }

    /// Speak `text`, cancelling whatever is currently being spoken.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn speak(&self, text: impl Into<String>, rate: f32, voice: Option<&str>) -> Utterance {
        self.speak_internal(text.into(), rate, voice, None)
    }

    /// Speak a short notice at the default rate and voice.
    pub fn announce(&self, text: impl Into<String>) -> Utterance {
        self.speak_internal(text.into(), self.config.default_rate, None, None)
    }

    /// Speak `text` using the rate and voice preferences in `settings`.
    pub fn speak_with(&self, text: impl Into<String>, settings: &ReadingSettings) -> Utterance {
        self.speak_internal(
            text.into(),
            settings.rate,
            settings.requested_voice(),
            settings.requested_lang(),
        )
    }

    fn speak_internal(
        &self,
        text: String,
        rate: f32,
        voice: Option<&str>,
        lang: Option<&str>,
    ) -> Utterance {
        self.cancel();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = UtteranceRequest {
            id,
            text,
            rate: self.config.clamp_rate(rate),
            voice: select_voice(
                &self.engine.voices(),
                voice,
                lang,
                &self.config.preferred_locale_prefix,
            ),
        };

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<Completion>();

        {
            let mut slot = self.active.lock().expect("speech slot mutex poisoned");
            *slot = Some(ActiveUtterance {
                id,
                cancel: cancel_tx,
            });
        }

        tracing::debug!(
            utterance = id,
            rate = request.rate,
            voice = request.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default"),
            chars = request.text.len(),
            "Utterance queued"
        );

        let engine = Arc::clone(&self.engine);
        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel_rx => Completion::Canceled,
                result = engine.utter(&request) => match result {
                    Ok(()) => Completion::NaturalEnd,
                    Err(e) => {
                        tracing::warn!(utterance = request.id, error = %e, "Utterance failed");
                        Completion::Failed(e.to_string())
                    }
                },
            };

            {
                let mut slot = active.lock().expect("speech slot mutex poisoned");
                if slot.as_ref().map(|a| a.id) == Some(request.id) {
                    *slot = None;
                }
            }

            tracing::debug!(utterance = request.id, outcome = ?outcome, "Utterance ended");
            // The caller may have dropped its handle; that is fine.
            let _ = done_tx.send(outcome);
        });

        Utterance { id, done: done_rx }
    }

    /// Stop the active utterance. Its completion resolves as `Canceled`.
    ///
    /// Returns whether anything was active.
    pub fn cancel(&self) -> bool {
        let active = self.active.lock().expect("speech slot mutex poisoned").take();
        match active {
            Some(active) => {
                let _ = active.cancel.send(());
                self.engine.halt();
                tracing::debug!(utterance = active.id, "Utterance cancelled");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{wait_until, ScriptedSpeechEngine};

    fn voices() -> Vec<VoiceInfo> {
        vec![
            VoiceInfo::new("Amelie", "fr-FR"),
            VoiceInfo::new("Daniel", "en-GB"),
            VoiceInfo::new("Samantha", "en-US"),
        ]
    }

    fn controller(engine: &Arc<ScriptedSpeechEngine>) -> SpeechController {
        SpeechController::new(engine.clone(), SpeechConfig::default())
    }

    #[test]
    fn test_select_requested_voice() {
        let v = select_voice(&voices(), Some("Samantha"), None, "en-").unwrap();
        assert_eq!(v.name, "Samantha");
    }

    #[test]
    fn test_select_falls_back_to_prefix() {
        let v = select_voice(&voices(), Some("Nobody"), None, "en-").unwrap();
        assert_eq!(v.name, "Daniel");
    }

    #[test]
    fn test_select_uses_language_hint() {
        let v = select_voice(&voices(), Some("Nobody"), Some("en-US"), "en-").unwrap();
        assert_eq!(v.name, "Samantha");
    }

    #[test]
    fn test_select_platform_default() {
        let only_french = vec![VoiceInfo::new("Amelie", "fr-FR")];
        assert!(select_voice(&only_french, None, None, "en-").is_none());
        assert!(select_voice(&[], Some("Samantha"), None, "en-").is_none());
    }

    #[tokio::test]
    async fn test_natural_completion() {
        let engine = Arc::new(ScriptedSpeechEngine::with_voices(voices()));
        let speech = controller(&engine);

        let utterance = speech.speak("hello", 1.0, None);
        assert!(wait_until(|| engine.pending() == 1).await);
        assert!(speech.is_speaking());

        assert!(engine.finish_current());
        assert_eq!(utterance.finished().await, Completion::NaturalEnd);
        assert!(!speech.is_speaking());

        let spoken = engine.requests();
        assert_eq!(spoken[0].text, "hello");
        assert_eq!(spoken[0].voice.as_ref().unwrap().name, "Daniel");
    }

    #[tokio::test]
    async fn test_new_utterance_cancels_active_one() {
        let engine = Arc::new(ScriptedSpeechEngine::new());
        let speech = controller(&engine);

        let first = speech.speak("first", 1.0, None);
        assert!(wait_until(|| engine.pending() == 1).await);
        let second = speech.speak("second", 1.0, None);

        assert_eq!(first.finished().await, Completion::Canceled);
        assert_eq!(engine.halts(), 1);

        assert!(wait_until(|| engine.pending() == 1).await);
        engine.finish_current();
        assert_eq!(second.finished().await, Completion::NaturalEnd);
    }

    #[tokio::test]
    async fn test_cancel_is_not_natural_end() {
        let engine = Arc::new(ScriptedSpeechEngine::new());
        let speech = controller(&engine);

        let utterance = speech.speak("text", 1.0, None);
        assert!(wait_until(|| engine.pending() == 1).await);
        assert!(speech.cancel());
        assert_eq!(utterance.finished().await, Completion::Canceled);
        assert!(!speech.cancel(), "nothing left to cancel");
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported() {
        let engine = Arc::new(ScriptedSpeechEngine::new());
        let speech = controller(&engine);

        let utterance = speech.speak("text", 1.0, None);
        assert!(wait_until(|| engine.pending() == 1).await);
        assert!(engine.fail_current("synthesis-failed"));
        match utterance.finished().await {
            Completion::Failed(msg) => assert!(msg.contains("synthesis-failed")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_is_clamped() {
        let engine = Arc::new(ScriptedSpeechEngine::instant());
        let speech = controller(&engine);

        speech.speak("fast", 99.0, None).finished().await;
        speech.speak("broken", -1.0, None).finished().await;

        let spoken = engine.requests();
        assert_eq!(spoken[0].rate, 10.0);
        assert_eq!(spoken[1].rate, 1.0);
    }

    #[tokio::test]
    async fn test_speak_with_settings() {
        let engine = Arc::new(ScriptedSpeechEngine::instant_with_voices(voices()));
        let speech = controller(&engine);

        let settings = ReadingSettings {
            rate: 1.5,
            voice: Some("Amelie".into()),
            voice_lang: Some("fr-FR".into()),
        };
        assert_eq!(
            speech.speak_with("bonjour", &settings).finished().await,
            Completion::NaturalEnd
        );
        let spoken = engine.requests();
        assert_eq!(spoken[0].voice.as_ref().unwrap().name, "Amelie");
        assert_eq!(spoken[0].rate, 1.5);
    }
}
