//! Voxpage application crate.
//!
//! Wires the background supervisor and per-tab workers together over an
//! in-process browser, with terminal stand-ins for speech and microphone.

pub mod browser;
pub mod cli;
pub mod console;
pub mod control;
pub mod input;

pub use browser::{BrowserParts, SimulatedBrowser};
pub use console::{ConsoleMicrophone, ConsoleSpeechEngine};
pub use control::ControlSurface;
pub use input::{parse_input, Input, USAGE};
