//! Parsing of the lines typed at the voxpage prompt.
//!
//! Lines starting with `:` drive the browser directly. Anything else is
//! speech picked up by the active tab's microphone.

use voxpage_core::messages::Action;
use voxpage_supervisor::Shortcut;

pub const USAGE: &str = "\
Type what you would say to the page (e.g. 'read page', 'stop', 'describe images', 'help').
Browser controls:
  :read :pause :images :help     send an action from the control surface
  :listen :mute                  start or stop voice recognition
  :shortcut <name>               keyboard command (start-reading, pause-reading)
  :alt <key>                     in-page shortcut (r, l, h)
  :click <n>                     click the n-th image (from 1)
  :reload                        reload the page
  :quit                          exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Say(String),
    Action(Action),
    Shortcut(Shortcut),
    AltKey(char),
    /// Zero-based image index.
    Click(usize),
    Reload,
    Quit,
    Invalid(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return Input::Say(line.to_string());
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let argument = words.next();
    match (name, argument) {
        ("read", None) => Input::Action(Action::StartReading),
        ("pause", None) => Input::Action(Action::PauseReading),
        ("images", None) => Input::Action(Action::DescribeImages),
        ("help", None) => Input::Action(Action::Help),
        ("listen", None) => Input::Action(Action::StartListening),
        ("mute", None) => Input::Action(Action::StopListening),
        ("reload", None) => Input::Reload,
        ("quit" | "q", None) => Input::Quit,
        ("shortcut", Some(name)) => match name.parse() {
            Ok(shortcut) => Input::Shortcut(shortcut),
            Err(e) => Input::Invalid(e.to_string()),
        },
        ("alt", Some(key)) => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Input::AltKey(c),
                _ => Input::Invalid(format!("not a single key: {}", key)),
            }
        }
        ("click", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Input::Click(n - 1),
            _ => Input::Invalid(format!("not an image number: {}", n)),
        },
        _ => Input::Invalid(format!("unknown command: {}", line)),
    }
}
