//! Browser-level keyboard commands.

use std::fmt;
use std::str::FromStr;

use voxpage_core::messages::{Action, ActionMessage};
use voxpage_core::types::ReadingSettings;

use crate::error::SupervisorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shortcut {
    StartReading,
    PauseReading,
}

impl Shortcut {
    pub fn name(&self) -> &'static str {
        match self {
            Shortcut::StartReading => "start-reading",
            Shortcut::PauseReading => "pause-reading",
        }
    }

    /// Action sent to the active tab. Reading starts at the default rate.
    pub fn action_message(&self) -> ActionMessage {
        match self {
            Shortcut::StartReading => {
                ActionMessage::with_settings(Action::StartReading, ReadingSettings::with_rate(1.0))
            }
            Shortcut::PauseReading => ActionMessage::new(Action::PauseReading),
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Shortcut {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start-reading" => Ok(Shortcut::StartReading),
            "pause-reading" => Ok(Shortcut::PauseReading),
            other => Err(SupervisorError::UnknownCommand(other.to_string())),
        }
    }
}
