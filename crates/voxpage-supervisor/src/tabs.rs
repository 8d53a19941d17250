//! Browser tab operations used by the supervisor.

use async_trait::async_trait;

use voxpage_core::messages::{TabMessage, TabResponse};
use voxpage_core::types::TabId;

use crate::error::SupervisorError;

/// Navigation progress reported for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStatus {
    Loading,
    Complete,
}

/// The browser's tab and scripting surface.
#[async_trait]
pub trait BrowserTabs: Send + Sync {
    /// Tab the user is looking at, if any.
    async fn active_tab(&self) -> Option<TabId>;

    async fn insert_css(&self, tab: TabId, files: &[String]) -> Result<(), SupervisorError>;

    async fn execute_script(&self, tab: TabId, files: &[String]) -> Result<(), SupervisorError>;

    /// Deliver `message` to the tab's worker and wait for its reply.
    ///
    /// Fails with [`SupervisorError::Unreachable`] when nothing in the tab is
    /// listening.
    async fn send_message(
        &self,
        tab: TabId,
        message: &TabMessage,
    ) -> Result<TabResponse, SupervisorError>;
}
