//! Voxpage reader crate - the per-tab reading engine.
//!
//! Linearizes the page into readable units, reads them one at a time through
//! the speech controller, interprets voice commands, describes images, and
//! exposes the tab's message entry point.

pub mod assistant;
pub mod commands;
pub mod dom;
pub mod error;
pub mod highlight;
pub mod images;
pub mod sequence;
pub mod session;
pub mod status;
pub mod worker;

pub use assistant::{Assistant, AssistantParts, KeyPress, HELP_TEXT, READY_GREETING};
pub use commands::{interpret, VoiceCommand};
pub use dom::{load_page_text, Document, NodeId, SharedDocument};
pub use error::ReaderError;
pub use highlight::Highlighter;
pub use images::{HeuristicDescriber, ImageDescriber, ImageNarrator, ImageSnapshot};
pub use sequence::{compute_sequence, ReadableUnit};
pub use session::{ReadingSession, ReadingState};
pub use status::RuntimeSender;
pub use worker::{AssistantFactory, TabWorker};
