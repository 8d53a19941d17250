//! Messages exchanged between execution contexts.
//!
//! Every message is JSON on the wire. Tab-directed traffic is either an
//! [`ActionMessage`] (`{"action": ..., "settings": ...}`) or a
//! [`ControlMessage`] tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::types::{ReadingSettings, TabId};

pub const STATUS_READING: &str = "Reading page content...";
pub const STATUS_FINISHED: &str = "Finished reading page";
pub const STATUS_PAUSED: &str = "Reading paused";
pub const STATUS_UNREACHABLE: &str = "Error: Could not communicate with page. Please refresh.";

/// Engine action requested of a tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    StartReading,
    PauseReading,
    DescribeImages,
    StartListening,
    StopListening,
    Help,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StartReading => "startReading",
            Action::PauseReading => "pauseReading",
            Action::DescribeImages => "describeImages",
            Action::StartListening => "startListening",
            Action::StopListening => "stopListening",
            Action::Help => "help",
        }
    }
}

/// `{action, settings?}` record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ReadingSettings>,
}

impl ActionMessage {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            settings: None,
        }
    }

    pub fn with_settings(action: Action, settings: ReadingSettings) -> Self {
        Self {
            action,
            settings: Some(settings),
        }
    }
}

/// Readiness, reachability and progress messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    /// A tab worker finished initialising.
    ContentScriptLoaded,
    /// Reachability check; answered even before initialisation.
    Ping,
    /// Progress narration for the control surface.
    Status { text: String },
}

impl ControlMessage {
    pub fn status(text: impl Into<String>) -> Self {
        ControlMessage::Status { text: text.into() }
    }
}

/// Anything a tab worker can receive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabMessage {
    Control(ControlMessage),
    Action(ActionMessage),
}

impl From<ActionMessage> for TabMessage {
    fn from(value: ActionMessage) -> Self {
        TabMessage::Action(value)
    }
}

impl From<ControlMessage> for TabMessage {
    fn from(value: ControlMessage) -> Self {
        TabMessage::Control(value)
    }
}

/// Reply to a tab or runtime message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TabResponse {
    Ok,
    Acknowledged,
    Error { error: String },
}

impl TabResponse {
    pub fn error(message: impl Into<String>) -> Self {
        TabResponse::Error {
            error: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, TabResponse::Error { .. })
    }
}

/// Messages sent over a persistent connection from a control surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortMessage {
    RequestInjection {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_message_wire_shape() {
        let msg = ActionMessage::with_settings(Action::StartReading, ReadingSettings::with_rate(1.0));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "startReading", "settings": {"rate": 1.0}})
        );
    }

    #[test]
    fn test_action_names_match_wire() {
        for action in [
            Action::StartReading,
            Action::PauseReading,
            Action::DescribeImages,
            Action::StartListening,
            Action::StopListening,
            Action::Help,
        ] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn test_control_messages_parse() {
        let ping: TabMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, TabMessage::Control(ControlMessage::Ping));

        let loaded: ControlMessage =
            serde_json::from_str(r#"{"type":"contentScriptLoaded"}"#).unwrap();
        assert_eq!(loaded, ControlMessage::ContentScriptLoaded);

        let status = serde_json::to_value(ControlMessage::status(STATUS_PAUSED)).unwrap();
        assert_eq!(
            status,
            serde_json::json!({"type": "status", "text": "Reading paused"})
        );
    }

    #[test]
    fn test_untagged_tab_message_picks_action() {
        let msg: TabMessage = serde_json::from_str(
            r#"{"action":"startReading","settings":{"rate":"2","voice":"","voiceLang":"en-US"}}"#,
        )
        .unwrap();
        match msg {
            TabMessage::Action(action) => {
                assert_eq!(action.action, Action::StartReading);
                let settings = action.settings.unwrap();
                assert_eq!(settings.rate, 2.0);
                assert_eq!(settings.requested_voice(), None);
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result: Result<TabMessage, _> = serde_json::from_str(r#"{"action":"fly"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_response_wire_shape() {
        assert_eq!(
            serde_json::to_value(TabResponse::Ok).unwrap(),
            serde_json::json!({"status": "ok"})
        );
        assert_eq!(
            serde_json::to_value(TabResponse::Acknowledged).unwrap(),
            serde_json::json!({"status": "acknowledged"})
        );
        assert_eq!(
            serde_json::to_value(TabResponse::error("boom")).unwrap(),
            serde_json::json!({"status": "error", "error": "boom"})
        );
        assert!(!TabResponse::error("x").is_ok());
    }

    #[test]
    fn test_port_message_wire_shape() {
        let msg: PortMessage =
            serde_json::from_str(r#"{"type":"request_injection","tabId":7}"#).unwrap();
        assert_eq!(msg, PortMessage::RequestInjection { tab_id: TabId(7) });
    }
}
