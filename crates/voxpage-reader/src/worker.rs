//! Tab message entry point.
//!
//! Holds the tab's single [`Assistant`], built by an injected factory when
//! the script starts. An action that finds no assistant builds it on demand.
//! Probes are answered without creating it. A failed creation is remembered
//! and every later action fails fast.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use voxpage_core::config::ReadingConfig;
use voxpage_core::messages::{ControlMessage, TabMessage, TabResponse};
use voxpage_core::types::TabId;

use crate::assistant::{Assistant, KeyPress};
use crate::dom::NodeId;
use crate::error::ReaderError;
use crate::status::RuntimeSender;

/// Builds the tab's assistant.
pub type AssistantFactory = Box<dyn Fn() -> Result<Arc<Assistant>, ReaderError> + Send + Sync>;

enum Slot {
    Empty,
    Ready(Arc<Assistant>),
    Failed(String),
}

pub struct TabWorker {
    tab: TabId,
    config: ReadingConfig,
    runtime: RuntimeSender,
    factory: AssistantFactory,
    slot: Mutex<Slot>,
}

impl TabWorker {
    pub fn new(
        tab: TabId,
        config: ReadingConfig,
        runtime: RuntimeSender,
        factory: AssistantFactory,
    ) -> Self {
        Self {
            tab,
            config,
            runtime,
            factory,
            slot: Mutex::new(Slot::Empty),
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// The assistant, if it has been created.
    pub fn assistant(&self) -> Option<Arc<Assistant>> {
        match &*self.slot.lock().expect("worker slot mutex poisoned") {
            Slot::Ready(assistant) => Some(Arc::clone(assistant)),
            _ => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.assistant().is_some()
    }

    /// Script load: build the assistant and report the tab ready.
    pub fn start(&self) -> Result<(), ReaderError> {
        self.ensure_assistant().map(|_| ())
    }

    fn ensure_assistant(&self) -> Result<Arc<Assistant>, ReaderError> {
        let mut slot = self.slot.lock().expect("worker slot mutex poisoned");
        match &*slot {
            Slot::Ready(assistant) => return Ok(Arc::clone(assistant)),
            Slot::Failed(reason) => return Err(ReaderError::InitFailed(reason.clone())),
            Slot::Empty => {}
        }

        tracing::info!(tab_id = %self.tab, "Creating vision assistant");
        match (self.factory)() {
            Ok(assistant) => {
                *slot = Slot::Ready(Arc::clone(&assistant));
                drop(slot);

                if self.runtime.send(ControlMessage::ContentScriptLoaded).is_err() {
                    tracing::warn!(tab_id = %self.tab, "Background unavailable for readiness announcement");
                }
                if self.config.announce_ready {
                    assistant.announce_ready(Duration::from_millis(
                        self.config.ready_announcement_delay_ms,
                    ));
                }
                Ok(assistant)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(tab_id = %self.tab, error = %reason, "Failed to initialize vision assistant");
                *slot = Slot::Failed(reason.clone());
                Err(ReaderError::InitFailed(reason))
            }
        }
    }

    /// Handle one message from another context.
    pub fn handle_message(&self, message: TabMessage) -> TabResponse {
        match message {
            TabMessage::Control(ControlMessage::Ping) => TabResponse::Ok,
            TabMessage::Control(other) => {
                tracing::debug!(tab_id = %self.tab, message = ?other, "Ignoring control message");
                TabResponse::Ok
            }
            TabMessage::Action(action) => {
                let result = self
                    .ensure_assistant()
                    .and_then(|assistant| assistant.handle_action(action));
                match result {
                    Ok(()) => TabResponse::Ok,
                    Err(e) => {
                        tracing::warn!(tab_id = %self.tab, error = %e, "Action failed");
                        TabResponse::error(e.to_string())
                    }
                }
            }
        }
    }

    /// Handle a JSON-encoded message and return the JSON-encoded reply.
    pub fn handle_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<TabMessage>(raw) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                tracing::warn!(tab_id = %self.tab, error = %e, "Malformed message");
                TabResponse::error(format!("invalid message: {}", e))
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            tracing::error!(tab_id = %self.tab, error = %e, "Cannot encode reply");
            serde_json::json!({ "status": "error", "error": e.to_string() }).to_string()
        })
    }

    /// Keyboard input on the page. Ignored until the assistant exists.
    pub fn on_key(&self, key: KeyPress) -> bool {
        match self.assistant() {
            Some(assistant) => assistant.handle_key(key),
            None => false,
        }
    }

    /// A click on an image speaks its description.
    pub fn on_image_click(&self, image: NodeId) {
        let Some(assistant) = self.assistant() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = assistant.describe_image(image).await {
                tracing::debug!(image = %image, error = %e, "Click was not on a describable image");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{AssistantParts, HELP_TEXT};
    use crate::dom::{shared, Document};
    use crate::images::HeuristicDescriber;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use voxpage_core::config::VoxConfig;
    use voxpage_core::messages::{Action, ActionMessage};
    use voxpage_core::prefs::MemoryPreferences;
    use voxpage_speech::mock::{wait_until, ScriptedRecognitionEngine, ScriptedSpeechEngine};

    struct Fixture {
        worker: TabWorker,
        speech: Arc<ScriptedSpeechEngine>,
        created: Arc<AtomicUsize>,
        runtime: mpsc::UnboundedReceiver<ControlMessage>,
    }

    fn fixture(fail: bool, config: ReadingConfig) -> Fixture {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p").unwrap();
        doc.append_text(p, "Page text").unwrap();
        doc.append_image(doc.root(), "Logo", 64, 64).unwrap();
        let document = shared(doc);

        let speech = Arc::new(ScriptedSpeechEngine::instant());
        let created = Arc::new(AtomicUsize::new(0));
        let (runtime_tx, runtime_rx) = mpsc::unbounded_channel();

        let factory: AssistantFactory = {
            let speech = speech.clone();
            let created = created.clone();
            let runtime = runtime_tx.clone();
            Box::new(move || {
                created.fetch_add(1, Ordering::SeqCst);
                if fail {
                    return Err(ReaderError::InitFailed("speech synthesis missing".into()));
                }
                let (recognition, events) = ScriptedRecognitionEngine::new();
                Assistant::new(
                    AssistantParts {
                        document: document.clone(),
                        speech_engine: speech.clone(),
                        recognition_engine: recognition,
                        recognition_events: events,
                        describer: Arc::new(HeuristicDescriber::new()),
                        preferences: Arc::new(MemoryPreferences::new()),
                        runtime: runtime.clone(),
                    },
                    &VoxConfig::default(),
                )
            })
        };

        Fixture {
            worker: TabWorker::new(TabId(7), config, runtime_tx, factory),
            speech,
            created,
            runtime: runtime_rx,
        }
    }

    fn quiet() -> ReadingConfig {
        ReadingConfig {
            announce_ready: false,
            ..ReadingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ping_answered_before_init() {
        let f = fixture(false, quiet());
        let response = f.worker.handle_message(ControlMessage::Ping.into());
        assert_eq!(response, TabResponse::Ok);
        assert!(!f.worker.is_initialized());
        assert_eq!(f.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_action_initializes_once() {
        let mut f = fixture(false, quiet());
        let help = TabMessage::from(ActionMessage::new(Action::Help));

        assert_eq!(f.worker.handle_message(help.clone()), TabResponse::Ok);
        assert_eq!(f.worker.handle_message(help), TabResponse::Ok);
        assert_eq!(f.created.load(Ordering::SeqCst), 1);
        assert!(f.worker.is_initialized());

        assert_eq!(f.runtime.try_recv().unwrap(), ControlMessage::ContentScriptLoaded);
        assert!(f.runtime.try_recv().is_err(), "readiness announced once");
    }

    #[tokio::test]
    async fn test_start_readies_tab_without_an_action() {
        let mut f = fixture(false, quiet());
        f.worker.start().unwrap();
        assert!(f.worker.is_initialized());
        assert_eq!(f.runtime.try_recv().unwrap(), ControlMessage::ContentScriptLoaded);

        assert!(f.worker.on_key(KeyPress::alt('h')));
        assert!(wait_until(|| f.speech.spoken_texts().contains(&HELP_TEXT.to_string())).await);

        f.worker.start().unwrap();
        assert_eq!(
            f.worker
                .handle_message(ActionMessage::new(Action::StopListening).into()),
            TabResponse::Ok
        );
        assert_eq!(f.created.load(Ordering::SeqCst), 1);
        assert!(f.runtime.try_recv().is_err(), "readiness announced once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_greets_when_enabled() {
        let f = fixture(false, ReadingConfig::default());
        f.worker.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(wait_until(|| f
            .speech
            .spoken_texts()
            .contains(&crate::assistant::READY_GREETING.to_string()))
        .await);
    }

    #[tokio::test]
    async fn test_failed_start_is_remembered() {
        let f = fixture(true, quiet());
        assert!(matches!(f.worker.start(), Err(ReaderError::InitFailed(_))));
        assert!(!f.worker.on_key(KeyPress::alt('h')));
        match f
            .worker
            .handle_message(ActionMessage::new(Action::Help).into())
        {
            TabResponse::Error { error } => assert!(error.contains("speech synthesis missing")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(f.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_init_fails_fast() {
        let mut f = fixture(true, quiet());
        let start = TabMessage::from(ActionMessage::new(Action::StartReading));

        for _ in 0..3 {
            match f.worker.handle_message(start.clone()) {
                TabResponse::Error { error } => assert!(error.contains("speech synthesis missing")),
                other => panic!("expected error, got {:?}", other),
            }
        }
        assert_eq!(f.created.load(Ordering::SeqCst), 1);
        assert!(f.runtime.try_recv().is_err());

        // Probes still succeed.
        assert_eq!(f.worker.handle_message(ControlMessage::Ping.into()), TabResponse::Ok);
    }

    #[tokio::test]
    async fn test_json_entry_point() {
        let f = fixture(false, quiet());
        assert_eq!(f.worker.handle_json(r#"{"type":"ping"}"#), r#"{"status":"ok"}"#);
        assert_eq!(
            f.worker
                .handle_json(r#"{"action":"startReading","settings":{"rate":"1.25"}}"#),
            r#"{"status":"ok"}"#
        );
        assert!(wait_until(|| f.speech.spoken_texts().contains(&"Page text".to_string())).await);
        assert_eq!(f.speech.requests()[0].rate, 1.25);

        let reply = f.worker.handle_json("not json");
        assert!(reply.starts_with(r#"{"status":"error""#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_greeting_after_init() {
        let f = fixture(false, ReadingConfig::default());
        f.worker
            .handle_message(ActionMessage::new(Action::StopListening).into());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(wait_until(|| f
            .speech
            .spoken_texts()
            .contains(&crate::assistant::READY_GREETING.to_string()))
        .await);
    }

    #[tokio::test]
    async fn test_keys_and_clicks_need_assistant() {
        let f = fixture(false, quiet());
        assert!(!f.worker.on_key(KeyPress::alt('h')));
        f.worker.on_image_click(NodeId::from_index(3));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.speech.spoken_texts().is_empty());

        f.worker
            .handle_message(ActionMessage::new(Action::StopListening).into());
        let image = f.worker.assistant().unwrap().narrator().images()[0];
        f.worker.on_image_click(image);
        assert!(wait_until(|| f
            .speech
            .spoken_texts()
            .iter()
            .any(|t| t.starts_with("Image alt text: Logo")))
        .await);
        assert!(f.worker.on_key(KeyPress::alt('h')));
    }
}
