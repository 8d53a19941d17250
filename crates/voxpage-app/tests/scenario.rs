//! End-to-end runs of the background supervisor and a tab worker over the
//! in-process browser.

use std::sync::Arc;

use tokio::sync::mpsc;

use voxpage_app::{BrowserParts, ControlSurface, SimulatedBrowser};
use voxpage_core::config::VoxConfig;
use voxpage_core::messages::{
    Action, ActionMessage, ControlMessage, STATUS_FINISHED, STATUS_READING, STATUS_UNREACHABLE,
};
use voxpage_core::prefs::{MemoryPreferences, PreferenceStore, KEY_SPEECH_RATE};
use voxpage_core::types::TabId;
use voxpage_reader::{load_page_text, HeuristicDescriber, KeyPress, HELP_TEXT, READY_GREETING};
use voxpage_speech::mock::{wait_until, ScriptedSpeechEngine};
use voxpage_supervisor::{Shortcut, SupervisorError, TabSupervisor};

const PAGE: &str = "\
# Birds of the coast

Gulls nest on the cliffs.

![A gull in flight](800x600)
Herring gull";

struct World {
    browser: Arc<SimulatedBrowser>,
    supervisor: Arc<TabSupervisor>,
    control: ControlSurface,
    speech: Arc<ScriptedSpeechEngine>,
    statuses: mpsc::UnboundedReceiver<ControlMessage>,
    seen: Vec<String>,
}

impl World {
    fn new() -> Self {
        let mut config = VoxConfig::default();
        config.reading.announce_ready = false;
        config.supervisor.settle_delay_ms = 10;

        let speech = Arc::new(ScriptedSpeechEngine::instant());
        let preferences = Arc::new(MemoryPreferences::new());
        preferences.set(KEY_SPEECH_RATE, "1.25").unwrap();

        let (background_tx, background_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let browser = Arc::new(SimulatedBrowser::new(BrowserParts {
            speech_engine: speech.clone(),
            describer: Arc::new(HeuristicDescriber::new()),
            preferences: preferences.clone(),
            config: config.clone(),
            background: background_tx.clone(),
        }));
        let supervisor = Arc::new(TabSupervisor::new(
            browser.clone(),
            config.supervisor.clone(),
            status_tx,
        ));
        tokio::spawn(Arc::clone(&supervisor).run(background_rx));

        Self {
            browser,
            supervisor,
            control: ControlSurface::new(background_tx, preferences),
            speech,
            statuses: status_rx,
            seen: Vec::new(),
        }
    }

    fn open_page(&self) -> TabId {
        self.browser.open_tab(load_page_text(PAGE).unwrap())
    }

    fn spoke(&self, text: &str) -> bool {
        self.speech.spoken_texts().iter().any(|t| t == text)
    }

    async fn wait_for_status(&mut self, text: &str) -> bool {
        let statuses = &mut self.statuses;
        let seen = &mut self.seen;
        wait_until(|| {
            while let Ok(message) = statuses.try_recv() {
                if let ControlMessage::Status { text } = message {
                    seen.push(text);
                }
            }
            seen.iter().any(|s| s == text)
        })
        .await
    }
}

#[tokio::test]
async fn test_control_surface_reads_page_to_the_end() {
    let mut world = World::new();
    let tab = world.open_page();

    world.control.request_injection(tab).unwrap();
    world.control.send(Action::StartReading).unwrap();

    assert!(world.wait_for_status(STATUS_FINISHED).await);
    assert!(world.seen.iter().any(|s| s == STATUS_READING));

    let read: Vec<_> = world
        .speech
        .requests()
        .into_iter()
        .filter(|r| r.rate == 1.25)
        .map(|r| r.text)
        .collect();
    assert_eq!(
        read,
        vec!["Birds of the coast", "Gulls nest on the cliffs.", "Herring gull"]
    );
    assert!(world.spoke("Finished reading page"));
    assert!(world.supervisor.is_ready(tab));
}

#[tokio::test]
async fn test_voice_commands_reach_the_page() {
    let world = World::new();
    let tab = world.open_page();

    world.control.send(Action::StartListening).unwrap();
    assert!(wait_until(|| world.spoke("Voice recognition started")).await);

    assert!(world.browser.hear(tab, "Describe images please"));
    assert!(wait_until(|| world.spoke("Found 1 images on the page.")).await);
    assert!(
        wait_until(|| world
            .speech
            .spoken_texts()
            .iter()
            .any(|t| t.starts_with("Image alt text: A gull in flight. Image dimensions: 800 by 600 pixels")))
        .await
    );

    assert!(world.browser.hear(tab, "help"));
    assert!(wait_until(|| world.spoke(HELP_TEXT)).await);
}

#[tokio::test]
async fn test_keyboard_command_and_in_page_keys() {
    let mut world = World::new();
    let tab = world.open_page();

    world.control.shortcut(Shortcut::StartReading).unwrap();
    assert!(world.wait_for_status(STATUS_FINISHED).await);
    // Keyboard commands read at the default rate, not the stored preference.
    assert!(world
        .speech
        .requests()
        .iter()
        .any(|r| r.text == "Birds of the coast" && r.rate == 1.0));

    assert!(world.browser.press_key(tab, KeyPress::alt('h')));
    assert!(wait_until(|| world.spoke(HELP_TEXT)).await);
    assert!(!world.browser.press_key(tab, KeyPress::alt('x')));

    assert!(world.browser.click_image(tab, 0));
    assert!(
        wait_until(|| world
            .speech
            .spoken_texts()
            .iter()
            .any(|t| t.starts_with("Image alt text: A gull in flight")))
        .await
    );
}

#[tokio::test]
async fn test_injection_alone_readies_the_page() {
    let mut world = World::new();
    let tab = world.open_page();

    world.supervisor.ensure_injected(tab).await.unwrap();
    assert!(wait_until(|| world.supervisor.is_ready(tab)).await);
    assert!(world.browser.worker(tab).unwrap().is_initialized());

    assert!(world.browser.press_key(tab, KeyPress::alt('r')));
    assert!(world.wait_for_status(STATUS_READING).await);
    assert!(wait_until(|| world.spoke("Birds of the coast")).await);

    assert!(world.browser.click_image(tab, 0));
    assert!(
        wait_until(|| world
            .speech
            .spoken_texts()
            .iter()
            .any(|t| t.starts_with("Image alt text: A gull in flight")))
        .await
    );
}

#[tokio::test]
async fn test_injection_request_greets_the_user() {
    let mut config = VoxConfig::default();
    config.reading.ready_announcement_delay_ms = 0;
    config.supervisor.settle_delay_ms = 10;
    let speech = Arc::new(ScriptedSpeechEngine::instant());
    let (background_tx, background_rx) = mpsc::unbounded_channel();
    let (status_tx, _status_rx) = mpsc::unbounded_channel();
    let preferences = Arc::new(MemoryPreferences::new());
    let browser = Arc::new(SimulatedBrowser::new(BrowserParts {
        speech_engine: speech.clone(),
        describer: Arc::new(HeuristicDescriber::new()),
        preferences: preferences.clone(),
        config: config.clone(),
        background: background_tx.clone(),
    }));
    let supervisor = Arc::new(TabSupervisor::new(
        browser.clone(),
        config.supervisor.clone(),
        status_tx,
    ));
    tokio::spawn(Arc::clone(&supervisor).run(background_rx));
    let control = ControlSurface::new(background_tx, preferences);

    let tab = browser.open_tab(load_page_text(PAGE).unwrap());
    control.request_injection(tab).unwrap();
    assert!(wait_until(|| supervisor.is_ready(tab)).await);
    assert!(wait_until(|| speech.spoken_texts().iter().any(|t| t == READY_GREETING)).await);
}

#[tokio::test]
async fn test_navigation_reinstalls_worker() {
    let world = World::new();
    let tab = world.open_page();

    world.control.request_injection(tab).unwrap();
    assert!(wait_until(|| world.supervisor.is_ready(tab)).await);
    let first = world.browser.worker(tab).unwrap();

    assert!(world.browser.navigate(tab, load_page_text(PAGE).unwrap()));
    assert!(wait_until(|| !world.supervisor.is_ready(tab)).await);
    assert!(world.browser.worker(tab).is_none());
    assert!(!world.browser.press_key(tab, KeyPress::alt('h')));

    world.control.request_injection(tab).unwrap();
    assert!(wait_until(|| world.supervisor.is_ready(tab)).await);
    assert!(world.browser.press_key(tab, KeyPress::alt('h')));
    assert!(wait_until(|| world.spoke(HELP_TEXT)).await);

    let response = world
        .supervisor
        .dispatch_action(ActionMessage::new(Action::Help))
        .await
        .unwrap();
    assert!(response.is_ok());
    let second = world.browser.worker(tab).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(wait_until(|| world.supervisor.is_ready(tab)).await);
}

#[tokio::test]
async fn test_restricted_page_reports_unreachable() {
    let mut world = World::new();
    world
        .browser
        .open_restricted_tab(load_page_text(PAGE).unwrap());

    world.control.send(Action::StartReading).unwrap();
    assert!(world.wait_for_status(STATUS_UNREACHABLE).await);
    assert!(world.speech.spoken_texts().is_empty());
}

#[tokio::test]
async fn test_closed_tab_leaves_no_target() {
    let world = World::new();
    let tab = world.open_page();
    assert!(world.browser.close_tab(tab));

    let result = world
        .supervisor
        .dispatch_action(ActionMessage::new(Action::Help))
        .await;
    assert_eq!(result, Err(SupervisorError::NoActiveTab));
    assert!(!world.browser.hear(tab, "read page"));
}
