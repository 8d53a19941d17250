//! Error types for the background supervisor.

use voxpage_core::error::VoxError;
use voxpage_core::types::TabId;

/// Errors from tab installation and message routing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    #[error("No active tab")]
    NoActiveTab,
    #[error("Tab {0} unreachable: {1}")]
    Unreachable(TabId, String),
    #[error("Injection into tab {0} failed: {1}")]
    InjectionFailed(TabId, String),
    #[error("Tab {0} still unreachable after reinstalling the worker")]
    RetryExhausted(TabId),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl From<SupervisorError> for VoxError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::InjectionFailed(..) => VoxError::Injection(err.to_string()),
            other => VoxError::Messaging(other.to_string()),
        }
    }
}
