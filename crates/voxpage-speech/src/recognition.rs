//! Voice command recognizer.
//!
//! Wraps a platform recognition engine whose sessions end on their own, and
//! presents it to the rest of the tab as one continuously available
//! capability: unexpected ends are followed by a delayed restart unless the
//! user asked to stop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use voxpage_core::config::RecognitionConfig;

use crate::error::RecognitionError;
use crate::output::SpeechController;
use crate::state::{RecognizerState, StateMachine};

pub const NOTICE_STARTED: &str = "Voice recognition started";
pub const NOTICE_STOPPED: &str = "Voice recognition stopped";
pub const NOTICE_PERMISSION: &str = "Please allow microphone access to use voice commands.";
pub const NOTICE_ERROR: &str = "Voice recognition error. Please try again.";
pub const NOTICE_UNSUPPORTED: &str =
    "Voice recognition is not supported in this browser. Please use Chrome.";

/// Parameters for one recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl From<&RecognitionConfig> for RecognitionOptions {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            language: config.language.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
        }
    }
}

/// Classified recognition error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Microphone access was refused.
    PermissionDenied,
    /// Anything else; treated as transient.
    Other(String),
}

impl RecognitionErrorKind {
    /// Classify a platform error code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Events emitted by a recognition engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    Result {
        transcripts: Vec<String>,
        is_final: bool,
    },
    Error(RecognitionErrorKind),
    Ended,
}

impl RecognitionEvent {
    /// Convenience constructor for a single final transcript.
    pub fn final_transcript(text: impl Into<String>) -> Self {
        Self::Result {
            transcripts: vec![text.into()],
            is_final: true,
        }
    }
}

/// Platform speech recognition.
///
/// Lifecycle and results are reported asynchronously on the event channel
/// handed to [`VoiceRecognizer::new`].
pub trait RecognitionEngine: Send + Sync {
    fn is_supported(&self) -> bool;
    fn start(&self, options: &RecognitionOptions) -> Result<(), RecognitionError>;
    fn stop(&self);
}

#[derive(Debug, Default)]
struct Inner {
    machine: StateMachine,
    should_stop: bool,
    permission_blocked: bool,
    restart_pending: bool,
    /// The session being started was not requested by the user.
    restarting: bool,
    unsupported_notified: bool,
    session: Option<Uuid>,
}

struct Shared {
    engine: Arc<dyn RecognitionEngine>,
    speech: Arc<SpeechController>,
    config: RecognitionConfig,
    options: RecognitionOptions,
    transcripts: mpsc::UnboundedSender<String>,
    inner: Mutex<Inner>,
    restarts: AtomicUsize,
}

/// Supervises recognition sessions for one tab context.
pub struct VoiceRecognizer {
    shared: Arc<Shared>,
    event_loop: JoinHandle<()>,
}

impl VoiceRecognizer {
    /// Create the recognizer and start consuming engine events.
    ///
    /// Final transcripts are forwarded on `transcripts`. Must be called from
    /// within a Tokio runtime.
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        events: mpsc::UnboundedReceiver<RecognitionEvent>,
        speech: Arc<SpeechController>,
        config: RecognitionConfig,
        transcripts: mpsc::UnboundedSender<String>,
    ) -> Self {
        let shared = Arc::new(Shared {
            engine,
            speech,
            options: RecognitionOptions::from(&config),
            config,
            transcripts,
            inner: Mutex::new(Inner::default()),
            restarts: AtomicUsize::new(0),
        });

        let event_loop = tokio::spawn(Shared::run(Arc::clone(&shared), events));
        Self { shared, event_loop }
    }

    /// Begin listening. No-op while a session is already active.
    pub fn start(&self) -> Result<(), RecognitionError> {
        Shared::begin(&self.shared, false)
    }

    /// Stop listening and suppress automatic restarts.
    pub fn stop(&self) {
        self.shared.end()
    }

    /// Start when idle, stop otherwise.
    pub fn toggle(&self) -> Result<(), RecognitionError> {
        if self.state().is_active() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    pub fn state(&self) -> RecognizerState {
        self.shared.lock().machine.current()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == RecognizerState::Listening
    }

    /// Identifier of the current session, if one is listening.
    pub fn session_id(&self) -> Option<Uuid> {
        self.shared.lock().session
    }

    /// Number of automatic restarts attempted so far.
    pub fn restarts(&self) -> usize {
        self.shared.restarts.load(Ordering::SeqCst)
    }
}

impl Drop for VoiceRecognizer {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("recognizer mutex poisoned")
    }

    async fn run(shared: Arc<Self>, mut events: mpsc::UnboundedReceiver<RecognitionEvent>) {
        while let Some(event) = events.recv().await {
            shared.handle(event);
        }
        tracing::debug!("Recognition event stream closed");
    }

    fn begin(shared: &Arc<Self>, is_restart: bool) -> Result<(), RecognitionError> {
        if !shared.engine.is_supported() {
            let first = {
                let mut inner = shared.lock();
                !std::mem::replace(&mut inner.unsupported_notified, true)
            };
            if first {
                tracing::warn!("Speech recognition unsupported; voice commands disabled");
                shared.speech.announce(NOTICE_UNSUPPORTED);
            }
            return Err(RecognitionError::Unsupported);
        }

        let mut inner = shared.lock();
        if is_restart {
            inner.restart_pending = false;
            if inner.should_stop || inner.machine.current() != RecognizerState::Idle {
                tracing::debug!(state = %inner.machine.current(), "Restart no longer needed");
                return Ok(());
            }
        } else {
            if inner.machine.current().is_active() {
                tracing::debug!(state = %inner.machine.current(), "Recognizer already active");
                return Ok(());
            }
            inner.should_stop = false;
            inner.permission_blocked = false;
        }

        inner.machine.transition(RecognizerState::Starting)?;
        inner.restarting = is_restart;
        if let Err(e) = shared.engine.start(&shared.options) {
            inner.machine.reset();
            inner.restarting = false;
            tracing::warn!(error = %e, restart = is_restart, "Failed to start recognition");
            return Err(e);
        }
        Ok(())
    }

    fn end(&self) {
        let was_active = {
            let mut inner = self.lock();
            inner.should_stop = true;
            match inner.machine.current() {
                RecognizerState::Starting | RecognizerState::Listening => {
                    inner.machine.transition(RecognizerState::Stopping).is_ok()
                }
                _ => false,
            }
        };

        if was_active {
            self.engine.stop();
            self.speech.announce(NOTICE_STOPPED);
        }
    }

    fn handle(self: &Arc<Self>, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Started => self.on_started(),
            RecognitionEvent::Ended => self.on_ended(),
            RecognitionEvent::Error(kind) => self.on_error(kind),
            RecognitionEvent::Result {
                transcripts,
                is_final,
            } => self.on_result(transcripts, is_final),
        }
    }

    fn on_started(&self) {
        let restarted = {
            let mut inner = self.lock();
            if let Err(e) = inner.machine.transition(RecognizerState::Listening) {
                tracing::debug!(error = %e, "Ignoring start event");
                return;
            }
            let session = Uuid::new_v4();
            inner.session = Some(session);
            let restarted = std::mem::take(&mut inner.restarting);
            tracing::info!(session = %session, restarted, "Voice recognition started");
            restarted
        };
        // Automatic restarts stay silent so they never cut off other speech.
        if !restarted {
            self.speech.announce(NOTICE_STARTED);
        }
    }

    fn on_ended(self: &Arc<Self>) {
        let mut inner = self.lock();
        inner.machine.reset();
        if let Some(session) = inner.session.take() {
            tracing::info!(session = %session, "Voice recognition ended");
        }

        if inner.should_stop {
            return;
        }
        if inner.permission_blocked && !self.config.restart_after_permission_denied {
            tracing::warn!("Not restarting recognition: microphone permission denied");
            return;
        }
        if inner.restart_pending {
            return;
        }
        inner.restart_pending = true;
        drop(inner);

        let delay = Duration::from_millis(self.config.restart_delay_ms);
        tracing::debug!(delay_ms = self.config.restart_delay_ms, "Scheduling recognition restart");
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.restarts.fetch_add(1, Ordering::SeqCst);
            // Engine errors are already logged by `begin`.
            let _ = Shared::begin(&shared, true);
        });
    }

    fn on_error(&self, kind: RecognitionErrorKind) {
        let notice = match &kind {
            RecognitionErrorKind::PermissionDenied => {
                self.lock().permission_blocked = true;
                NOTICE_PERMISSION
            }
            RecognitionErrorKind::Other(_) => NOTICE_ERROR,
        };
        tracing::warn!(error = ?kind, "Speech recognition error");
        self.speech.announce(notice);
    }

    fn on_result(&self, transcripts: Vec<String>, is_final: bool) {
        if !is_final {
            return;
        }
        let Some(transcript) = transcripts
            .iter()
            .rev()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
        else {
            return;
        };

        let command = transcript.to_lowercase();
        tracing::debug!(command = %command, "Recognized command");
        if self.transcripts.send(command).is_err() {
            tracing::warn!("Transcript consumer gone; recognition continues");
        }
    }
}
