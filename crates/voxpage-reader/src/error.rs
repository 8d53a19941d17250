//! Error types for the per-tab reading engine.

use voxpage_core::error::VoxError;
use voxpage_speech::RecognitionError;

use crate::dom::NodeId;

/// Errors from the reading engine and its tab entry point.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Node is not an element: {0}")]
    NotAnElement(NodeId),
    #[error("Node is not an image: {0}")]
    NotAnImage(NodeId),
    #[error("Page load failed: {0}")]
    PageLoad(String),
    #[error("Image description failed: {0}")]
    Describe(String),
    #[error("Vision assistant not initialized: {0}")]
    InitFailed(String),
    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("Preferences error: {0}")]
    Preferences(#[from] VoxError),
}

impl From<ReaderError> for VoxError {
    fn from(err: ReaderError) -> Self {
        match err {
            ReaderError::InitFailed(msg) => VoxError::Initialization(msg),
            ReaderError::Preferences(inner) => inner,
            other => VoxError::Reading(other.to_string()),
        }
    }
}
