//! Recognizer state machine with validated transitions.
//!
//! Enforces valid state transitions for one recognition session:
//! - Idle -> Starting (start requested, engine not yet confirmed)
//! - Starting -> Listening (engine reported start)
//! - Listening -> Stopping (stop requested)
//! - Starting -> Stopping (stop requested before the engine confirmed)
//! - Stopping -> Idle (engine acknowledged the stop)
//! - Starting -> Idle, Listening -> Idle (session ended unexpectedly)

use std::fmt;

use crate::error::RecognitionError;

/// Operational state of the voice command recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizerState {
    /// No recognition session. Ready to start.
    Idle,
    /// Start requested; waiting for the engine to confirm.
    Starting,
    /// Continuously listening for commands.
    Listening,
    /// Stop requested; waiting for the engine's end event.
    Stopping,
}

impl fmt::Display for RecognizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognizerState::Idle => write!(f, "Idle"),
            RecognizerState::Starting => write!(f, "Starting"),
            RecognizerState::Listening => write!(f, "Listening"),
            RecognizerState::Stopping => write!(f, "Stopping"),
        }
    }
}

impl RecognizerState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &RecognizerState) -> bool {
        matches!(
            (self, target),
            (RecognizerState::Idle, RecognizerState::Starting)
                | (RecognizerState::Starting, RecognizerState::Listening)
                | (RecognizerState::Listening, RecognizerState::Stopping)
                | (RecognizerState::Starting, RecognizerState::Stopping)
                | (RecognizerState::Stopping, RecognizerState::Idle)
                // Unexpected end
                | (RecognizerState::Starting, RecognizerState::Idle)
                | (RecognizerState::Listening, RecognizerState::Idle)
        )
    }

    /// A session is active from the start request until the engine ends it.
    pub fn is_active(&self) -> bool {
        !matches!(self, RecognizerState::Idle)
    }
}

/// Validated state holder. Owned by the recognizer's inner state, so it is
/// always mutated under the recognizer's lock.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: RecognizerState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: RecognizerState::Idle,
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> RecognizerState {
        self.state
    }

    /// Attempt to transition to the target state.
    pub fn transition(&mut self, target: RecognizerState) -> Result<(), RecognitionError> {
        if self.state.can_transition_to(&target) {
            tracing::debug!("Recognizer state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(RecognitionError::InvalidTransition {
                from: self.state,
                to: target,
            })
        }
    }

    /// Force the state machine back to Idle.
    pub fn reset(&mut self) {
        if self.state != RecognizerState::Idle {
            tracing::debug!("Recognizer state reset to Idle from {}", self.state);
        }
        self.state = RecognizerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(RecognizerState::Idle.to_string(), "Idle");
        assert_eq!(RecognizerState::Starting.to_string(), "Starting");
        assert_eq!(RecognizerState::Listening.to_string(), "Listening");
        assert_eq!(RecognizerState::Stopping.to_string(), "Stopping");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(RecognizerState::Idle.can_transition_to(&RecognizerState::Starting));
        assert!(RecognizerState::Starting.can_transition_to(&RecognizerState::Listening));
        assert!(RecognizerState::Listening.can_transition_to(&RecognizerState::Stopping));
        assert!(RecognizerState::Stopping.can_transition_to(&RecognizerState::Idle));
        assert!(RecognizerState::Listening.can_transition_to(&RecognizerState::Idle));
        assert!(RecognizerState::Starting.can_transition_to(&RecognizerState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!RecognizerState::Idle.can_transition_to(&RecognizerState::Listening));
        assert!(!RecognizerState::Idle.can_transition_to(&RecognizerState::Stopping));
        assert!(!RecognizerState::Stopping.can_transition_to(&RecognizerState::Listening));
        assert!(!RecognizerState::Listening.can_transition_to(&RecognizerState::Starting));

        for state in [
            RecognizerState::Idle,
            RecognizerState::Starting,
            RecognizerState::Listening,
            RecognizerState::Stopping,
        ] {
            assert!(!state.can_transition_to(&state), "{} -> {}", state, state);
        }
    }

    #[test]
    fn test_happy_path() {
        let mut sm = StateMachine::new();
        sm.transition(RecognizerState::Starting).unwrap();
        sm.transition(RecognizerState::Listening).unwrap();
        sm.transition(RecognizerState::Stopping).unwrap();
        sm.transition(RecognizerState::Idle).unwrap();
        assert_eq!(sm.current(), RecognizerState::Idle);
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut sm = StateMachine::new();
        let result = sm.transition(RecognizerState::Listening);
        assert!(matches!(
            result,
            Err(RecognitionError::InvalidTransition {
                from: RecognizerState::Idle,
                to: RecognizerState::Listening
            })
        ));
        assert_eq!(sm.current(), RecognizerState::Idle);
    }

    #[test]
    fn test_reset() {
        let mut sm = StateMachine::new();
        sm.transition(RecognizerState::Starting).unwrap();
        sm.reset();
        assert_eq!(sm.current(), RecognizerState::Idle);
        assert!(!sm.current().is_active());
    }
}
