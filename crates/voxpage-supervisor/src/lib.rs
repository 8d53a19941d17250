//! Background supervisor for the reading assistant.
//!
//! Tracks which tabs carry a live worker, installs the worker on demand and
//! routes control surface actions and keyboard commands to the active tab.

pub mod error;
pub mod registry;
pub mod shortcuts;
pub mod supervisor;
pub mod tabs;

pub use error::SupervisorError;
pub use registry::{ReadyTabs, TabRecord};
pub use shortcuts::Shortcut;
pub use supervisor::{BackgroundEvent, TabSupervisor};
pub use tabs::{BrowserTabs, NavigationStatus};
