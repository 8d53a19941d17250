//! Voxpage application binary - composition root.
//!
//! 1. Load configuration from TOML and initialise tracing
//! 2. Load the page into a tab of the in-process browser
//! 3. Start the background supervisor's event loop
//! 4. Open the control surface, which requests injection and starts listening
//! 5. Feed stdin lines to the tab's microphone until `:quit`

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use voxpage_app::cli::CliArgs;
use voxpage_app::{
    parse_input, BrowserParts, ConsoleSpeechEngine, ControlSurface, Input, SimulatedBrowser,
    USAGE,
};
use voxpage_core::config::VoxConfig;
use voxpage_core::messages::{Action, ControlMessage};
use voxpage_core::prefs::{MemoryPreferences, PreferenceStore, KEY_SELECTED_VOICE, KEY_SPEECH_RATE};
use voxpage_core::types::TabId;
use voxpage_reader::{load_page_text, HeuristicDescriber, KeyPress};
use voxpage_supervisor::TabSupervisor;

const DEMO_PAGE: &str = "\
# Welcome to voxpage

This page is read aloud one paragraph at a time. The paragraph being read is highlighted.

Say 'describe images' to hear about the picture below.

![A lighthouse on a rocky coast at sunset](1200x800)
The lighthouse at Point Reyes.

Say 'stop' to pause and 'read page' to carry on from where you left off.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let config = VoxConfig::load_or_default(&config_file);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting voxpage v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Page.
    let source = match &args.page {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Cannot read page");
            e
        })?,
        None => DEMO_PAGE.to_string(),
    };
    let document = load_page_text(&source)?;

    // Preferences, seeded from the command line.
    let preferences = Arc::new(MemoryPreferences::new());
    if let Some(rate) = args.rate {
        preferences.set(KEY_SPEECH_RATE, &rate.to_string())?;
    }
    if let Some(ref voice) = args.voice {
        preferences.set(KEY_SELECTED_VOICE, voice)?;
    }

    // Background.
    let (background_tx, background_rx) = mpsc::unbounded_channel();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let browser = Arc::new(SimulatedBrowser::new(BrowserParts {
        speech_engine: Arc::new(ConsoleSpeechEngine::new()),
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
    let background = tokio::spawn(Arc::clone(&supervisor).run(background_rx));

    tokio::spawn(async move {
        while let Some(message) = status_rx.recv().await {
            if let ControlMessage::Status { text } = message {
                println!("[status] {}", text);
            }
        }
    });

    // Tab and control surface.
    let tab = browser.open_tab(document);
    let control = ControlSurface::new(background_tx, preferences);
    control.request_injection(tab)?;
    control.send(Action::StartListening)?;

    println!("{}", USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            input => handle_input(input, tab, &source, &browser, &control),
        }
    }

    tracing::info!("Shutting down");
    supervisor.shutdown();
    let _ = background.await;
    Ok(())
}

fn handle_input(
    input: Input,
    tab: TabId,
    source: &str,
    browser: &SimulatedBrowser,
    control: &ControlSurface,
) {
    let result = match input {
        Input::Empty | Input::Quit => Ok(()),
        Input::Say(text) => {
            if !browser.hear(tab, &text) {
                println!("(not listening; try :listen)");
            }
            Ok(())
        }
        Input::Action(action) => control.send(action),
        Input::Shortcut(shortcut) => control.shortcut(shortcut),
        Input::AltKey(key) => {
            if !browser.press_key(tab, KeyPress::alt(key)) {
                println!("(key not handled)");
            }
            Ok(())
        }
        Input::Click(nth) => {
            if !browser.click_image(tab, nth) {
                println!("(no such image)");
            }
            Ok(())
        }
        Input::Reload => match load_page_text(source) {
            Ok(document) => {
                browser.navigate(tab, document);
                control
                    .request_injection(tab)
                    .and_then(|()| control.send(Action::StartListening))
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot reload page");
                Ok(())
            }
        },
        Input::Invalid(reason) => {
            println!("{}", reason);
            Ok(())
        }
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "Request failed");
    }
}
