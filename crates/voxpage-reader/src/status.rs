//! Outbound messages from the tab context to the background.

use tokio::sync::mpsc;

use voxpage_core::messages::ControlMessage;

/// Channel carrying readiness and progress messages out of the tab.
pub type RuntimeSender = mpsc::UnboundedSender<ControlMessage>;

/// Publish a progress line. A missing listener is not an error.
pub fn emit_status(runtime: &RuntimeSender, text: &str) {
    tracing::debug!(status = %text, "Status");
    if runtime.send(ControlMessage::status(text)).is_err() {
        tracing::debug!("No status listener");
    }
}
