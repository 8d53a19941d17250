//! In-process browser: tabs holding documents, script installation and
//! message delivery between the background and each tab's worker.
//!
//! Every message to a tab goes through its JSON wire form.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use voxpage_core::config::VoxConfig;
use voxpage_core::messages::{ControlMessage, TabMessage, TabResponse};
use voxpage_core::prefs::PreferenceStore;
use voxpage_core::types::TabId;
use voxpage_reader::{
    dom::shared, Assistant, AssistantFactory, AssistantParts, Document, ImageDescriber, KeyPress,
    SharedDocument, TabWorker,
};
use voxpage_speech::SpeechEngine;
use voxpage_supervisor::{BackgroundEvent, BrowserTabs, NavigationStatus, SupervisorError};

use crate::console::ConsoleMicrophone;

/// Collaborators shared by every tab.
pub struct BrowserParts {
    pub speech_engine: Arc<dyn SpeechEngine>,
    pub describer: Arc<dyn ImageDescriber>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub config: VoxConfig,
    /// The background's event queue.
    pub background: mpsc::UnboundedSender<BackgroundEvent>,
}

type MicrophoneSlot = Arc<Mutex<Option<Arc<ConsoleMicrophone>>>>;

struct Tab {
    document: SharedDocument,
    /// Pages such as the browser's own settings refuse scripts.
    scriptable: bool,
    worker: Option<Arc<TabWorker>>,
    microphone: MicrophoneSlot,
}

impl Tab {
    fn new(document: Document, scriptable: bool) -> Self {
        Self {
            document: shared(document),
            scriptable,
            worker: None,
            microphone: Arc::new(Mutex::new(None)),
        }
    }
}

pub struct SimulatedBrowser {
    parts: BrowserParts,
    tabs: Mutex<HashMap<TabId, Tab>>,
    active: Mutex<Option<TabId>>,
    next_id: AtomicU32,
}

impl SimulatedBrowser {
    pub fn new(parts: BrowserParts) -> Self {
        Self {
            parts,
            tabs: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            next_id: AtomicU32::new(1),
        }
    }

    fn tabs(&self) -> MutexGuard<'_, HashMap<TabId, Tab>> {
        self.tabs.lock().expect("tabs mutex poisoned")
    }

    fn notify(&self, event: BackgroundEvent) {
        if self.parts.background.send(event).is_err() {
            tracing::debug!("Background stopped; event dropped");
        }
    }

    /// Open `document` in a new tab and focus it.
    pub fn open_tab(&self, document: Document) -> TabId {
        self.insert_tab(document, true)
    }

    /// Open a page that rejects script installation.
    pub fn open_restricted_tab(&self, document: Document) -> TabId {
        self.insert_tab(document, false)
    }

    fn insert_tab(&self, document: Document, scriptable: bool) -> TabId {
        let tab = TabId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.tabs().insert(tab, Tab::new(document, scriptable));
        self.activate(tab);
        tracing::info!(tab_id = %tab, "Tab opened");
        tab
    }

    pub fn activate(&self, tab: TabId) {
        *self.active.lock().expect("active tab mutex poisoned") = Some(tab);
    }

    /// Load `document` into `tab`, discarding its worker.
    pub fn navigate(&self, tab: TabId, document: Document) -> bool {
        {
            let mut tabs = self.tabs();
            let Some(entry) = tabs.get_mut(&tab) else {
                return false;
            };
            let scriptable = entry.scriptable;
            *entry = Tab::new(document, scriptable);
        }
        tracing::info!(tab_id = %tab, "Tab navigated");
        self.notify(BackgroundEvent::TabUpdated {
            tab,
            status: NavigationStatus::Loading,
        });
        self.notify(BackgroundEvent::TabUpdated {
            tab,
            status: NavigationStatus::Complete,
        });
        true
    }

    pub fn close_tab(&self, tab: TabId) -> bool {
        if self.tabs().remove(&tab).is_none() {
            return false;
        }
        {
            let mut active = self.active.lock().expect("active tab mutex poisoned");
            if *active == Some(tab) {
                *active = None;
            }
        }
        tracing::info!(tab_id = %tab, "Tab closed");
        self.notify(BackgroundEvent::TabRemoved(tab));
        true
    }

    pub fn worker(&self, tab: TabId) -> Option<Arc<TabWorker>> {
        self.tabs().get(&tab).and_then(|t| t.worker.clone())
    }

    pub fn document(&self, tab: TabId) -> Option<SharedDocument> {
        self.tabs().get(&tab).map(|t| t.document.clone())
    }

    /// Speak into the tab's microphone. Returns false if it is not listening.
    pub fn hear(&self, tab: TabId, text: &str) -> bool {
        let microphone = self
            .tabs()
            .get(&tab)
            .and_then(|t| t.microphone.lock().expect("microphone mutex poisoned").clone());
        match microphone {
            Some(microphone) => microphone.hear(text),
            None => false,
        }
    }

    pub fn press_key(&self, tab: TabId, key: KeyPress) -> bool {
        self.worker(tab).is_some_and(|w| w.on_key(key))
    }

    /// Click the `nth` image of the page (zero based).
    pub fn click_image(&self, tab: TabId, nth: usize) -> bool {
        let (Some(worker), Some(document)) = (self.worker(tab), self.document(tab)) else {
            return false;
        };
        let image = document
            .read()
            .expect("document lock poisoned")
            .images()
            .get(nth)
            .copied();
        match image {
            Some(image) => {
                worker.on_image_click(image);
                true
            }
            None => false,
        }
    }

    /// Start the worker script in `tab`.
    fn install_worker(&self, tab: TabId, entry: &mut Tab) -> Arc<TabWorker> {
        let (runtime_tx, mut runtime_rx) = mpsc::unbounded_channel::<ControlMessage>();

        let background = self.parts.background.clone();
        tokio::spawn(async move {
            while let Some(message) = runtime_rx.recv().await {
                let event = BackgroundEvent::Runtime {
                    tab,
                    message,
                    reply: None,
                };
                if background.send(event).is_err() {
                    break;
                }
            }
        });

        let factory: AssistantFactory = {
            let document = entry.document.clone();
            let microphone = entry.microphone.clone();
            let speech_engine = self.parts.speech_engine.clone();
            let describer = self.parts.describer.clone();
            let preferences = self.parts.preferences.clone();
            let config = self.parts.config.clone();
            let runtime = runtime_tx.clone();
            Box::new(move || {
                let (engine, events) = ConsoleMicrophone::new();
                *microphone.lock().expect("microphone mutex poisoned") = Some(engine.clone());
                Assistant::new(
                    AssistantParts {
                        document: document.clone(),
                        speech_engine: speech_engine.clone(),
                        recognition_engine: engine,
                        recognition_events: events,
                        describer: describer.clone(),
                        preferences: preferences.clone(),
                        runtime: runtime.clone(),
                    },
                    &config,
                )
            })
        };

        let worker = Arc::new(TabWorker::new(
            tab,
            self.parts.config.reading.clone(),
            runtime_tx,
            factory,
        ));
        entry.worker = Some(Arc::clone(&worker));
        worker
    }
}

#[async_trait]
impl BrowserTabs for SimulatedBrowser {
    async fn active_tab(&self) -> Option<TabId> {
        *self.active.lock().expect("active tab mutex poisoned")
    }

    async fn insert_css(&self, tab: TabId, files: &[String]) -> Result<(), SupervisorError> {
        let tabs = self.tabs();
        match tabs.get(&tab) {
            Some(entry) if entry.scriptable => {
                tracing::debug!(tab_id = %tab, files = files.len(), "Stylesheets inserted");
                Ok(())
            }
            Some(_) => Err(SupervisorError::InjectionFailed(
                tab,
                "Cannot access contents of this page".to_string(),
            )),
            None => Err(SupervisorError::InjectionFailed(
                tab,
                format!("No tab with id: {}", tab),
            )),
        }
    }

    async fn execute_script(&self, tab: TabId, files: &[String]) -> Result<(), SupervisorError> {
        let worker = {
            let mut tabs = self.tabs();
            let Some(entry) = tabs.get_mut(&tab) else {
                return Err(SupervisorError::InjectionFailed(
                    tab,
                    format!("No tab with id: {}", tab),
                ));
            };
            if !entry.scriptable {
                return Err(SupervisorError::InjectionFailed(
                    tab,
                    "Cannot access contents of this page".to_string(),
                ));
            }
            if entry.worker.is_some() {
                tracing::debug!(tab_id = %tab, "Worker script already running");
                return Ok(());
            }
            self.install_worker(tab, entry)
        };
        tracing::debug!(tab_id = %tab, files = ?files, "Worker script started");
        // A failed build is remembered and reported to later actions.
        if let Err(e) = worker.start() {
            tracing::warn!(tab_id = %tab, error = %e, "Worker started without an assistant");
        }
        Ok(())
    }

    async fn send_message(
        &self,
        tab: TabId,
        message: &TabMessage,
    ) -> Result<TabResponse, SupervisorError> {
        let worker = self.worker(tab).ok_or_else(|| {
            SupervisorError::Unreachable(
                tab,
                "Could not establish connection. Receiving end does not exist.".to_string(),
            )
        })?;
        let raw = serde_json::to_string(message)
            .map_err(|e| SupervisorError::Unreachable(tab, e.to_string()))?;
        let reply = worker.handle_json(&raw);
        serde_json::from_str(&reply).map_err(|e| SupervisorError::Unreachable(tab, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxpage_core::prefs::MemoryPreferences;
    use voxpage_reader::{load_page_text, HeuristicDescriber};
    use voxpage_speech::mock::ScriptedSpeechEngine;

    fn browser() -> (SimulatedBrowser, mpsc::UnboundedReceiver<BackgroundEvent>) {
        let mut config = VoxConfig::default();
        config.reading.announce_ready = false;
        let (tx, rx) = mpsc::unbounded_channel();
        let browser = SimulatedBrowser::new(BrowserParts {
            speech_engine: Arc::new(ScriptedSpeechEngine::instant()),
            describer: Arc::new(HeuristicDescriber::new()),
            preferences: Arc::new(MemoryPreferences::new()),
            config,
            background: tx,
        });
        (browser, rx)
    }

    #[tokio::test]
    async fn test_installed_script_reports_loaded() {
        let (browser, mut events) = browser();
        let tab = browser.open_tab(load_page_text("Hello there").unwrap());

        browser.execute_script(tab, &[]).await.unwrap();
        let worker = browser.worker(tab).unwrap();
        assert!(worker.is_initialized());

        match events.recv().await.unwrap() {
            BackgroundEvent::Runtime { tab: from, message, .. } => {
                assert_eq!(from, tab);
                assert_eq!(message, ControlMessage::ContentScriptLoaded);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // A second installation keeps the running worker.
        browser.execute_script(tab, &[]).await.unwrap();
        assert!(Arc::ptr_eq(&worker, &browser.worker(tab).unwrap()));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_restricted_tab_rejects_script() {
        let (browser, _events) = browser();
        let tab = browser.open_restricted_tab(load_page_text("Settings").unwrap());
        assert!(matches!(
            browser.execute_script(tab, &[]).await,
            Err(SupervisorError::InjectionFailed(_, _))
        ));
        assert!(browser.worker(tab).is_none());
    }
}
