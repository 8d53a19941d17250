//! Voice command interpreter.
//!
//! Matching is by substring so recognizer noise around a phrase ("please
//! read page now") still dispatches. Phrases are tried longest first.

use std::fmt;

use voxpage_core::messages::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceCommand {
    ReadPage,
    Pause,
    DescribeImages,
    Help,
}

impl VoiceCommand {
    /// The tab action this command performs.
    pub fn action(&self) -> Action {
        match self {
            VoiceCommand::ReadPage => Action::StartReading,
            VoiceCommand::Pause => Action::PauseReading,
            VoiceCommand::DescribeImages => Action::DescribeImages,
            VoiceCommand::Help => Action::Help,
        }
    }
}

impl fmt::Display for VoiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceCommand::ReadPage => "read page",
            VoiceCommand::Pause => "pause",
            VoiceCommand::DescribeImages => "describe images",
            VoiceCommand::Help => "help",
        };
        write!(f, "{}", name)
    }
}

/// Command grammar, ordered longest phrase first.
const PHRASES: &[(&str, VoiceCommand)] = &[
    ("describe images", VoiceCommand::DescribeImages),
    ("read page", VoiceCommand::ReadPage),
    ("pause", VoiceCommand::Pause),
    ("stop", VoiceCommand::Pause),
    ("help", VoiceCommand::Help),
];

/// Map a lower-cased transcript to a command. Unknown input yields `None`.
pub fn interpret(transcript: &str) -> Option<VoiceCommand> {
    let transcript = transcript.trim();
    PHRASES
        .iter()
        .find(|(phrase, _)| transcript.contains(*phrase))
        .map(|(_, command)| *command)
}
