//! Terminal stand-ins for the platform speech and recognition engines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use voxpage_core::types::VoiceInfo;
use voxpage_speech::{
    RecognitionEngine, RecognitionError, RecognitionEvent, RecognitionOptions, SpeechEngine,
    SpeechError, UtteranceRequest,
};

/// Speaking time per word at rate 1.
const SECONDS_PER_WORD: f32 = 0.25;

/// Prints each utterance and takes as long to "say" it as a voice would.
#[derive(Debug)]
pub struct ConsoleSpeechEngine {
    voices: Vec<VoiceInfo>,
}

impl ConsoleSpeechEngine {
    pub fn new() -> Self {
        Self {
            voices: vec![
                VoiceInfo::new("Console English", "en-US"),
                VoiceInfo::new("Console Deutsch", "de-DE"),
            ],
        }
    }

    /// How long `text` takes at `rate`.
    pub fn duration_of(text: &str, rate: f32) -> Duration {
        let words = text.split_whitespace().count() as f32;
        Duration::from_secs_f32(words * SECONDS_PER_WORD / rate.max(0.1))
    }
}

impl Default for ConsoleSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechEngine for ConsoleSpeechEngine {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    async fn utter(&self, request: &UtteranceRequest) -> Result<(), SpeechError> {
        let voice = request
            .voice
            .as_ref()
            .map(|v| v.name.as_str())
            .unwrap_or("default");
        println!("[speech:{} x{:.2}] {}", voice, request.rate, request.text);
        tokio::time::sleep(Self::duration_of(&request.text, request.rate)).await;
        Ok(())
    }

    fn halt(&self) {
        tracing::debug!("Console speech halted");
    }
}

/// Recognition engine whose "microphone" is whatever the user types.
///
/// Heard text only becomes a result while a session is open.
#[derive(Debug)]
pub struct ConsoleMicrophone {
    events: mpsc::UnboundedSender<RecognitionEvent>,
    open: AtomicBool,
}

impl ConsoleMicrophone {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let microphone = Arc::new(Self {
            events: tx,
            open: AtomicBool::new(false),
        });
        (microphone, rx)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Deliver `text` as a final transcript. Returns false if nothing was listening.
    pub fn hear(&self, text: &str) -> bool {
        if !self.is_open() {
            tracing::debug!("Microphone closed; ignoring input");
            return false;
        }
        self.emit(RecognitionEvent::final_transcript(text))
    }

    fn emit(&self, event: RecognitionEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

impl RecognitionEngine for ConsoleMicrophone {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&self, options: &RecognitionOptions) -> Result<(), RecognitionError> {
        tracing::debug!(language = %options.language, "Microphone opened");
        self.open.store(true, Ordering::SeqCst);
        if !self.emit(RecognitionEvent::Started) {
            self.open.store(false, Ordering::SeqCst);
            return Err(RecognitionError::Engine("recognizer gone".to_string()));
        }
        Ok(())
    }

    fn stop(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.emit(RecognitionEvent::Ended);
        }
    }
}
