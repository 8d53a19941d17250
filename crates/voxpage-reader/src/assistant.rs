//! Per-tab assistant.
//!
//! One instance per tab context. Owns the reading session, the voice command
//! recognizer and the image narrator, and turns actions, voice commands and
//! keyboard input into calls on them.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voxpage_core::config::VoxConfig;
use voxpage_core::messages::{Action, ActionMessage};
use voxpage_core::prefs::PreferenceStore;
use voxpage_core::types::ReadingSettings;
use voxpage_speech::{
    Completion, RecognitionEngine, RecognitionEvent, RecognizerState, SpeechController,
    SpeechEngine, VoiceRecognizer,
};

use crate::commands::{interpret, VoiceCommand};
use crate::dom::{NodeId, SharedDocument};
use crate::error::ReaderError;
use crate::highlight::Highlighter;
use crate::images::{ImageDescriber, ImageNarrator};
use crate::session::{ReadingSession, ReadingState};
use crate::status::RuntimeSender;

pub const READY_GREETING: &str = "Vision assist is ready. Say 'help' for available commands.";

pub const HELP_TEXT: &str = "Available commands: \
'Read page' - Start reading the page. \
'Stop' or 'Pause' - Stop reading. \
'Describe images' - Describe all images on the page. \
'Help' - List available commands. \
Keyboard shortcuts: \
Alt + R - Start or stop reading. \
Alt + L - Start or stop voice recognition. \
Alt + H - Show help. \
You can also click on any image to hear its description.";

/// Collaborators an assistant is built from.
pub struct AssistantParts {
    pub document: SharedDocument,
    pub speech_engine: Arc<dyn SpeechEngine>,
    pub recognition_engine: Arc<dyn RecognitionEngine>,
    pub recognition_events: mpsc::UnboundedReceiver<RecognitionEvent>,
    pub describer: Arc<dyn ImageDescriber>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub runtime: RuntimeSender,
}

/// A key press delivered to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: char,
    pub alt: bool,
}

impl KeyPress {
    pub fn alt(key: char) -> Self {
        Self { key, alt: true }
    }
}

pub struct Assistant {
    speech: Arc<SpeechController>,
    session: ReadingSession,
    recognizer: VoiceRecognizer,
    narrator: Arc<ImageNarrator>,
    settings: ReadingSettings,
    command_loop: JoinHandle<()>,
}

impl Assistant {
    /// Build the assistant and start routing recognized transcripts to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(parts: AssistantParts, config: &VoxConfig) -> Result<Arc<Self>, ReaderError> {
        let settings = ReadingSettings::from_preferences(parts.preferences.as_ref())?;
        let speech = Arc::new(SpeechController::new(
            parts.speech_engine,
            config.speech.clone(),
        ));

        let highlighter = Highlighter::new(
            parts.document.clone(),
            config.reading.highlight_class.clone(),
        );
        let session = ReadingSession::new(
            parts.document.clone(),
            Arc::clone(&speech),
            highlighter,
            parts.runtime,
        );

        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        let recognizer = VoiceRecognizer::new(
            parts.recognition_engine,
            parts.recognition_events,
            Arc::clone(&speech),
            config.recognition.clone(),
            transcript_tx,
        );

        let narrator = Arc::new(ImageNarrator::new(parts.document, parts.describer));

        let assistant = Arc::new_cyclic(|weak: &Weak<Assistant>| Assistant {
            speech,
            session,
            recognizer,
            narrator,
            settings,
            command_loop: tokio::spawn(command_loop(weak.clone(), transcript_rx)),
        });

        tracing::info!(rate = assistant.settings.rate, "Vision assistant initialized");
        Ok(assistant)
    }

    pub fn settings(&self) -> &ReadingSettings {
        &self.settings
    }

    pub fn reading_state(&self) -> ReadingState {
        self.session.state()
    }

    pub fn is_reading(&self) -> bool {
        self.session.is_reading()
    }

    pub fn recognizer_state(&self) -> RecognizerState {
        self.recognizer.state()
    }

    pub fn session(&self) -> &ReadingSession {
        &self.session
    }

    pub fn narrator(&self) -> &ImageNarrator {
        &self.narrator
    }

    /// Perform one action requested by another context.
    pub fn handle_action(self: &Arc<Self>, message: ActionMessage) -> Result<(), ReaderError> {
        tracing::debug!(action = message.action.as_str(), "Handling action");
        match message.action {
            Action::StartReading => {
                let settings = message.settings.unwrap_or_else(|| self.settings.clone());
                self.session.start(settings);
            }
            Action::PauseReading => self.session.pause(),
            Action::DescribeImages => self.spawn_describe_images(),
            Action::StartListening => self.recognizer.start()?,
            Action::StopListening => self.recognizer.stop(),
            Action::Help => self.announce_help(),
        }
        Ok(())
    }

    /// Run one recognized transcript through the command grammar.
    pub fn handle_transcript(self: &Arc<Self>, transcript: &str) -> Option<VoiceCommand> {
        let command = interpret(transcript)?;
        tracing::info!(command = %command, "Voice command");
        let message = match command {
            VoiceCommand::ReadPage => ActionMessage::with_settings(
                Action::StartReading,
                self.settings.clone(),
            ),
            other => ActionMessage::new(other.action()),
        };
        if let Err(e) = self.handle_action(message) {
            tracing::warn!(command = %command, error = %e, "Voice command failed");
        }
        Some(command)
    }

    /// In-page keyboard shortcuts. Returns whether the key was handled.
    pub fn handle_key(self: &Arc<Self>, key: KeyPress) -> bool {
        if !key.alt {
            return false;
        }
        match key.key.to_ascii_lowercase() {
            'r' => self.session.toggle(self.settings.clone()),
            'l' => {
                if let Err(e) = self.recognizer.toggle() {
                    tracing::warn!(error = %e, "Cannot toggle voice recognition");
                }
            }
            'h' => self.announce_help(),
            _ => return false,
        }
        true
    }

    pub fn announce_help(&self) {
        self.speech.speak_with(HELP_TEXT, &self.settings);
    }

    /// Speak the ready greeting after `delay`.
    pub fn announce_ready(self: &Arc<Self>, delay: Duration) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(assistant) = weak.upgrade() {
                assistant.speech.announce(READY_GREETING);
            }
        });
    }

    /// Count the page's images, then describe each in turn.
    ///
    /// Each description waits for the previous one to finish naturally; any
    /// cancellation ends the run. Returns how many descriptions completed.
    pub async fn describe_images(&self) -> usize {
        let images = self.narrator.images();
        tracing::info!(images = images.len(), "Describing images");

        let intro = format!("Found {} images on the page.", images.len());
        if self.speech.speak_with(intro, &self.settings).finished().await != Completion::NaturalEnd {
            return 0;
        }

        let mut described = 0;
        for image in images {
            let description = match self.narrator.describe(image).await {
                Ok(description) => description,
                Err(e) => {
                    tracing::warn!(image = %image, error = %e, "Skipping image");
                    continue;
                }
            };
            match self.speech.speak_with(description, &self.settings).finished().await {
                Completion::NaturalEnd => described += 1,
                other => {
                    tracing::debug!(outcome = ?other, "Image descriptions interrupted");
                    break;
                }
            }
        }
        described
    }

    fn spawn_describe_images(self: &Arc<Self>) {
        let assistant = Arc::clone(self);
        tokio::spawn(async move {
            assistant.describe_images().await;
        });
    }

    /// Speak the description of one image, e.g. after it was clicked.
    pub async fn describe_image(&self, image: NodeId) -> Result<Completion, ReaderError> {
        let description = self.narrator.describe(image).await?;
        Ok(self
            .speech
            .speak_with(description, &self.settings)
            .finished()
            .await)
    }
}

impl Drop for Assistant {
    fn drop(&mut self) {
        self.command_loop.abort();
        self.speech.cancel();
    }
}

async fn command_loop(assistant: Weak<Assistant>, mut transcripts: mpsc::UnboundedReceiver<String>) {
    while let Some(transcript) = transcripts.recv().await {
        let Some(assistant) = assistant.upgrade() else {
            break;
        };
        if assistant.handle_transcript(&transcript).is_none() {
            tracing::debug!(transcript = %transcript, "No command recognized");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{shared, Document};
    use crate::images::HeuristicDescriber;
    use voxpage_core::messages::{ControlMessage, STATUS_PAUSED};
    use voxpage_core::prefs::{MemoryPreferences, KEY_SPEECH_RATE};
    use voxpage_speech::mock::{wait_until, ScriptedRecognitionEngine, ScriptedSpeechEngine};

    struct Harness {
        assistant: Arc<Assistant>,
        speech: Arc<ScriptedSpeechEngine>,
        recognition: Arc<ScriptedRecognitionEngine>,
        document: SharedDocument,
        _runtime: mpsc::UnboundedReceiver<ControlMessage>,
    }

    fn harness(instant: bool) -> Harness {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p").unwrap();
        doc.append_text(p, "Hello world").unwrap();
        let figure = doc.append_element(doc.root(), "figure").unwrap();
        doc.append_image(figure, "A cat", 100, 50).unwrap();
        doc.append_image(doc.root(), "A dog", 30, 40).unwrap();
        let document = shared(doc);

        let speech = Arc::new(if instant {
            ScriptedSpeechEngine::instant()
        } else {
            ScriptedSpeechEngine::new()
        });
        let (recognition, events) = ScriptedRecognitionEngine::new();
        let prefs = MemoryPreferences::new();
        prefs.set(KEY_SPEECH_RATE, "1.5").unwrap();
        let (runtime, runtime_rx) = mpsc::unbounded_channel();

        let assistant = Assistant::new(
            AssistantParts {
                document: document.clone(),
                speech_engine: speech.clone(),
                recognition_engine: recognition.clone(),
                recognition_events: events,
                describer: Arc::new(HeuristicDescriber::new()),
                preferences: Arc::new(prefs),
                runtime,
            },
            &VoxConfig::default(),
        )
        .unwrap();

        Harness {
            assistant,
            speech,
            recognition,
            document,
            _runtime: runtime_rx,
        }
    }

    #[tokio::test]
    async fn test_settings_come_from_preferences() {
        let h = harness(true);
        assert_eq!(h.assistant.settings().rate, 1.5);
    }

    #[tokio::test]
    async fn test_voice_command_starts_reading() {
        let h = harness(false);
        h.recognition.emit(RecognitionEvent::final_transcript("Please READ page now"));
        assert!(wait_until(|| h.speech.spoken_texts().contains(&"Hello world".to_string())).await);
        assert!(h.assistant.is_reading());
        assert_eq!(h.speech.requests()[0].rate, 1.5);

        h.recognition.emit(RecognitionEvent::final_transcript("stop"));
        assert!(wait_until(|| h.assistant.reading_state() == ReadingState::Paused).await);
        assert!(wait_until(|| h.speech.spoken_texts().contains(&STATUS_PAUSED.to_string())).await);
    }

    #[tokio::test]
    async fn test_unknown_transcript_is_ignored() {
        let h = harness(true);
        assert_eq!(h.assistant.handle_transcript("what's the weather"), None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.speech.spoken_texts().is_empty());
    }

    #[tokio::test]
    async fn test_describe_images_in_order() {
        let h = harness(true);
        assert_eq!(h.assistant.describe_images().await, 2);

        let spoken = h.speech.spoken_texts();
        assert_eq!(spoken[0], "Found 2 images on the page.");
        assert!(spoken[1].starts_with("Image alt text: A cat"));
        assert!(spoken[2].starts_with("Image alt text: A dog"));
        assert_eq!(h.assistant.narrator().cache().len(), 2);
    }

    #[tokio::test]
    async fn test_describe_images_stops_when_cancelled() {
        let h = harness(false);
        let assistant = h.assistant.clone();
        let run = tokio::spawn(async move { assistant.describe_images().await });

        assert!(wait_until(|| h.speech.pending() == 1).await);
        h.speech.finish_current();
        assert!(wait_until(|| h.speech.requests().len() == 2 && h.speech.pending() == 1).await);

        h.assistant.handle_action(ActionMessage::new(Action::PauseReading)).unwrap();
        assert_eq!(run.await.unwrap(), 0);
        assert!(!h
            .speech
            .spoken_texts()
            .iter()
            .any(|t| t.contains("A dog")));
    }

    #[tokio::test]
    async fn test_image_click_speaks_description() {
        let h = harness(true);
        let image = h.document.read().unwrap().images()[1];
        let outcome = h.assistant.describe_image(image).await.unwrap();
        assert_eq!(outcome, Completion::NaturalEnd);
        assert_eq!(
            h.speech.spoken_texts(),
            vec!["Image alt text: A dog. Image dimensions: 30 by 40 pixels. Context: Hello world"]
        );
    }

    #[tokio::test]
    async fn test_keyboard_shortcuts() {
        let h = harness(false);
        assert!(h.assistant.handle_key(KeyPress::alt('r')));
        assert!(h.assistant.is_reading());
        assert!(h.assistant.handle_key(KeyPress::alt('R')));
        assert_eq!(h.assistant.reading_state(), ReadingState::Paused);

        assert!(h.assistant.handle_key(KeyPress::alt('l')));
        assert!(wait_until(|| h.assistant.recognizer_state() == RecognizerState::Listening).await);
        assert!(h.assistant.handle_key(KeyPress::alt('l')));
        assert!(wait_until(|| h.assistant.recognizer_state() == RecognizerState::Idle).await);

        assert!(h.assistant.handle_key(KeyPress::alt('h')));
        assert!(wait_until(|| h.speech.spoken_texts().iter().any(|t| t == HELP_TEXT)).await);

        assert!(!h.assistant.handle_key(KeyPress { key: 'r', alt: false }));
        assert!(!h.assistant.handle_key(KeyPress::alt('x')));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_greeting_is_delayed() {
        let h = harness(true);
        h.assistant.announce_ready(Duration::from_millis(1000));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(h.speech.spoken_texts().is_empty());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(wait_until(|| h.speech.spoken_texts() == vec![READY_GREETING]).await);
    }

    #[tokio::test]
    async fn test_listening_actions() {
        let h = harness(true);
        h.assistant
            .handle_action(ActionMessage::new(Action::StartListening))
            .unwrap();
        assert!(wait_until(|| h.assistant.recognizer_state() == RecognizerState::Listening).await);
        h.assistant
            .handle_action(ActionMessage::new(Action::StopListening))
            .unwrap();
        assert_eq!(h.recognition.stops(), 1);
    }
}
