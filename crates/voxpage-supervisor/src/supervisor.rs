//! Background tab supervisor.
//!
//! Installs the reading worker into tabs on demand, tracks which tabs have a
//! live worker, and routes actions to the active tab with a ping, reinstall
//! and single retry.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};

use voxpage_core::config::SupervisorConfig;
use voxpage_core::messages::{
    ActionMessage, ControlMessage, PortMessage, TabMessage, TabResponse, STATUS_UNREACHABLE,
};
use voxpage_core::types::TabId;

use crate::error::SupervisorError;
use crate::registry::ReadyTabs;
use crate::shortcuts::Shortcut;
use crate::tabs::{BrowserTabs, NavigationStatus};

/// Everything the background context reacts to.
#[derive(Debug)]
pub enum BackgroundEvent {
    /// A message sent by a tab's worker.
    Runtime {
        tab: TabId,
        message: ControlMessage,
        reply: Option<oneshot::Sender<TabResponse>>,
    },
    TabUpdated {
        tab: TabId,
        status: NavigationStatus,
    },
    TabRemoved(TabId),
    /// A message from a control surface's persistent connection.
    Port(PortMessage),
    /// A browser-level keyboard command.
    Command(Shortcut),
    /// An action requested by a control surface for the active tab.
    Action(ActionMessage),
}

pub struct TabSupervisor {
    tabs: Arc<dyn BrowserTabs>,
    config: SupervisorConfig,
    ready: Mutex<ReadyTabs>,
    control: mpsc::UnboundedSender<ControlMessage>,
    shutdown: Notify,
}

impl TabSupervisor {
    /// `control` receives status lines for the control surface.
    pub fn new(
        tabs: Arc<dyn BrowserTabs>,
        config: SupervisorConfig,
        control: mpsc::UnboundedSender<ControlMessage>,
    ) -> Self {
        Self {
            tabs,
            config,
            ready: Mutex::new(ReadyTabs::new()),
            control,
            shutdown: Notify::new(),
        }
    }

    fn ready(&self) -> MutexGuard<'_, ReadyTabs> {
        self.ready.lock().expect("ready tabs mutex poisoned")
    }

    pub fn is_ready(&self, tab: TabId) -> bool {
        self.ready().is_ready(tab)
    }

    pub fn ready_count(&self) -> usize {
        self.ready().len()
    }

    fn emit_status(&self, text: &str) {
        if self.control.send(ControlMessage::status(text)).is_err() {
            tracing::debug!(status = %text, "No control surface listening");
        }
    }

    /// Install the worker into `tab` unless it is already known to be ready.
    ///
    /// After installing, waits the settle delay so the worker can announce
    /// itself before the caller sends it anything.
    pub async fn ensure_injected(&self, tab: TabId) -> Result<(), SupervisorError> {
        if self.is_ready(tab) {
            tracing::debug!(tab_id = %tab, "Worker already present");
            return Ok(());
        }

        tracing::info!(tab_id = %tab, "Installing worker");
        if !self.config.stylesheet_files.is_empty() {
            self.tabs
                .insert_css(tab, &self.config.stylesheet_files)
                .await?;
        }
        self.tabs
            .execute_script(tab, &self.config.script_files)
            .await?;

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        Ok(())
    }

    /// Handle a message sent by a tab's worker.
    pub fn on_runtime_message(&self, tab: TabId, message: ControlMessage) -> TabResponse {
        match message {
            ControlMessage::ContentScriptLoaded => {
                if self.ready().mark_ready(tab) {
                    tracing::info!(tab_id = %tab, "Tab ready");
                }
                TabResponse::Acknowledged
            }
            ControlMessage::Status { text } => {
                self.emit_status(&text);
                TabResponse::Ok
            }
            ControlMessage::Ping => TabResponse::Ok,
        }
    }

    pub fn on_tab_updated(&self, tab: TabId, status: NavigationStatus) {
        if status == NavigationStatus::Complete && self.ready().forget(tab) {
            tracing::debug!(tab_id = %tab, "Tab navigated; worker gone");
        }
    }

    pub fn on_tab_removed(&self, tab: TabId) {
        if self.ready().forget(tab) {
            tracing::debug!(tab_id = %tab, "Tab closed");
        }
    }

    pub async fn on_port_message(&self, message: PortMessage) -> Result<(), SupervisorError> {
        match message {
            PortMessage::RequestInjection { tab_id } => self.ensure_injected(tab_id).await,
        }
    }

    pub async fn on_command(&self, shortcut: Shortcut) -> Result<TabResponse, SupervisorError> {
        tracing::debug!(command = %shortcut, "Keyboard command");
        self.dispatch_action(shortcut.action_message()).await
    }

    /// Send an action to the active tab.
    ///
    /// Pings the tab first. If the ping or the action fails, the tab's
    /// record is dropped, the worker reinstalled, and the action sent once
    /// more. A second failure is reported to the control surface and not
    /// retried.
    pub async fn dispatch_action(
        &self,
        message: ActionMessage,
    ) -> Result<TabResponse, SupervisorError> {
        let tab = self
            .tabs
            .active_tab()
            .await
            .ok_or(SupervisorError::NoActiveTab)?;
        let request = TabMessage::Action(message);

        let first = match self.ping(tab).await {
            Ok(()) => self.tabs.send_message(tab, &request).await,
            Err(e) => Err(e),
        };

        let response = match first {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(tab_id = %tab, error = %e, "Tab unreachable; reinstalling worker");
                self.ready().forget(tab);
                let retry = match self.ensure_injected(tab).await {
                    Ok(()) => self.tabs.send_message(tab, &request).await,
                    Err(e) => Err(e),
                };
                match retry {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(tab_id = %tab, error = %e, "Tab still unreachable");
                        self.emit_status(STATUS_UNREACHABLE);
                        return Err(SupervisorError::RetryExhausted(tab));
                    }
                }
            }
        };

        if let TabResponse::Error { error } = &response {
            tracing::warn!(tab_id = %tab, error = %error, "Tab rejected action");
            self.emit_status(&format!("Error: {}", error));
        }
        Ok(response)
    }

    async fn ping(&self, tab: TabId) -> Result<(), SupervisorError> {
        let response = self
            .tabs
            .send_message(tab, &TabMessage::Control(ControlMessage::Ping))
            .await?;
        if response.is_ok() {
            Ok(())
        } else {
            Err(SupervisorError::Unreachable(
                tab,
                format!("ping answered {:?}", response),
            ))
        }
    }

    /// Process background events until the channel closes or shutdown.
    ///
    /// Lifecycle events are applied in order; actions, commands and port
    /// requests run as their own tasks so a settle delay never stalls
    /// readiness announcements.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<BackgroundEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => return,
                },
                _ = self.shutdown.notified() => return,
            }
        }
    }

    /// Signal the event loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    fn handle_event(self: &Arc<Self>, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Runtime {
                tab,
                message,
                reply,
            } => {
                let response = self.on_runtime_message(tab, message);
                if let Some(reply) = reply {
                    let _ = reply.send(response);
                }
            }
            BackgroundEvent::TabUpdated { tab, status } => self.on_tab_updated(tab, status),
            BackgroundEvent::TabRemoved(tab) => self.on_tab_removed(tab),
            BackgroundEvent::Port(message) => {
                let supervisor = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = supervisor.on_port_message(message).await {
                        tracing::error!(error = %e, "Injection request failed");
                    }
                });
            }
            BackgroundEvent::Command(shortcut) => {
                let supervisor = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = supervisor.on_command(shortcut).await {
                        tracing::warn!(command = %shortcut, error = %e, "Keyboard command failed");
                    }
                });
            }
            BackgroundEvent::Action(message) => {
                let supervisor = Arc::clone(self);
                tokio::spawn(async move {
                    let action = message.action;
                    if let Err(e) = supervisor.dispatch_action(message).await {
                        tracing::warn!(action = action.as_str(), error = %e, "Action failed");
                    }
                });
            }
        }
    }
}
