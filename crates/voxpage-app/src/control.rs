//! The control surface: sends actions to the background on the user's behalf.

use std::sync::Arc;

use tokio::sync::mpsc;

use voxpage_core::error::{Result, VoxError};
use voxpage_core::messages::{Action, ActionMessage, PortMessage};
use voxpage_core::prefs::PreferenceStore;
use voxpage_core::types::{ReadingSettings, TabId};
use voxpage_supervisor::{BackgroundEvent, Shortcut};

pub struct ControlSurface {
    background: mpsc::UnboundedSender<BackgroundEvent>,
    preferences: Arc<dyn PreferenceStore>,
}

impl ControlSurface {
    pub fn new(
        background: mpsc::UnboundedSender<BackgroundEvent>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            background,
            preferences,
        }
    }

    fn post(&self, event: BackgroundEvent) -> Result<()> {
        self.background
            .send(event)
            .map_err(|_| VoxError::Messaging("background is not running".to_string()))
    }

    /// Ask the background to make sure `tab` has a worker, as the surface
    /// does whenever it opens.
    pub fn request_injection(&self, tab: TabId) -> Result<()> {
        self.post(BackgroundEvent::Port(PortMessage::RequestInjection { tab_id: tab }))
    }

    /// Send `action` to the active tab. Reading requests carry the stored
    /// voice and rate preferences.
    pub fn send(&self, action: Action) -> Result<()> {
        let message = match action {
            Action::StartReading => ActionMessage::with_settings(
                action,
                ReadingSettings::from_preferences(self.preferences.as_ref())?,
            ),
            other => ActionMessage::new(other),
        };
        self.post(BackgroundEvent::Action(message))
    }

    pub fn shortcut(&self, shortcut: Shortcut) -> Result<()> {
        self.post(BackgroundEvent::Command(shortcut))
    }
}
