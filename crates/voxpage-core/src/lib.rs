pub mod config;
pub mod error;
pub mod messages;
pub mod prefs;
pub mod types;

pub use config::VoxConfig;
pub use error::{Result, VoxError};
pub use messages::{Action, ActionMessage, ControlMessage, PortMessage, TabMessage, TabResponse};
pub use prefs::PreferenceStore;
pub use types::*;
