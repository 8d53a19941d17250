//! Scripted engines for tests and headless runs.
//!
//! Neither engine touches real audio. The speech engine holds every
//! utterance open until the test finishes or fails it (or completes it
//! immediately in instant mode); the recognition engine echoes start and
//! stop requests as lifecycle events and lets tests inject anything else.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use voxpage_core::types::VoiceInfo;

use crate::error::{RecognitionError, SpeechError};
use crate::output::{SpeechEngine, UtteranceRequest};
use crate::recognition::{RecognitionEngine, RecognitionEvent, RecognitionOptions};

type Pending = oneshot::Sender<Result<(), SpeechError>>;

/// Speech engine driven by the test.
#[derive(Debug, Default)]
pub struct ScriptedSpeechEngine {
    voices: Vec<VoiceInfo>,
    instant: bool,
    requests: Mutex<Vec<UtteranceRequest>>,
    pending: Mutex<Vec<Pending>>,
    halts: AtomicUsize,
}

impl ScriptedSpeechEngine {
    /// Engine whose utterances stay open until finished by the test.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voices(voices: Vec<VoiceInfo>) -> Self {
        Self {
            voices,
            ..Self::default()
        }
    }

    /// Engine whose utterances end naturally as soon as they start.
    pub fn instant() -> Self {
        Self {
            instant: true,
            ..Self::default()
        }
    }

    pub fn instant_with_voices(voices: Vec<VoiceInfo>) -> Self {
        Self {
            voices,
            instant: true,
            ..Self::default()
        }
    }

    /// Every request handed to the engine, in order.
    pub fn requests(&self) -> Vec<UtteranceRequest> {
        self.requests.lock().expect("mock mutex poisoned").clone()
    }

    /// Texts of every request, in order.
    pub fn spoken_texts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.text).collect()
    }

    /// Number of `halt` calls.
    pub fn halts(&self) -> usize {
        self.halts.load(Ordering::SeqCst)
    }

    /// Utterances currently being "spoken".
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .expect("mock mutex poisoned")
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// End the most recent open utterance naturally.
    pub fn finish_current(&self) -> bool {
        self.complete_current(Ok(()))
    }

    /// Fail the most recent open utterance.
    pub fn fail_current(&self, message: &str) -> bool {
        self.complete_current(Err(SpeechError::Engine(message.to_string())))
    }

    fn complete_current(&self, result: Result<(), SpeechError>) -> bool {
        let mut pending = self.pending.lock().expect("mock mutex poisoned");
        pending.retain(|tx| !tx.is_closed());
        match pending.pop() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl SpeechEngine for ScriptedSpeechEngine {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    async fn utter(&self, request: &UtteranceRequest) -> Result<(), SpeechError> {
        self.requests
            .lock()
            .expect("mock mutex poisoned")
            .push(request.clone());

        if self.instant {
            tokio::task::yield_now().await;
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("mock mutex poisoned").push(tx);
        rx.await
            .unwrap_or_else(|_| Err(SpeechError::Engine("utterance abandoned".to_string())))
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Recognition engine driven by the test.
///
/// `start` emits `Started` and `stop` emits `Ended`, the way a platform
/// engine acknowledges those requests.
#[derive(Debug)]
pub struct ScriptedRecognitionEngine {
    events: mpsc::UnboundedSender<RecognitionEvent>,
    supported: AtomicBool,
    fail_next_start: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    last_options: Mutex<Option<RecognitionOptions>>,
}

impl ScriptedRecognitionEngine {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            events: tx,
            supported: AtomicBool::new(true),
            fail_next_start: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        });
        (engine, rx)
    }

    /// Inject an arbitrary event.
    pub fn emit(&self, event: RecognitionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Recognition event dropped: recognizer gone");
        }
    }

    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    /// Make the next `start` call fail.
    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<RecognitionOptions> {
        self.last_options.lock().expect("mock mutex poisoned").clone()
    }
}

impl RecognitionEngine for ScriptedRecognitionEngine {
    fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    fn start(&self, options: &RecognitionOptions) -> Result<(), RecognitionError> {
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(RecognitionError::Engine("audio-capture".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().expect("mock mutex poisoned") = Some(options.clone());
        self.emit(RecognitionEvent::Started);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.emit(RecognitionEvent::Ended);
    }
}

/// Poll `condition` until it holds, yielding to spawned tasks in between.
///
/// Gives up after roughly two seconds of (possibly paused) runtime time.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
