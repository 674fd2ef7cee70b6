//! Envelopes exchanged with browser clients.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::errors::{ProtocolError, Result};
use crate::status::UpstreamStatus;

/// Message sent to a client that asks for a heatmap while the backend is down.
pub const UPSTREAM_NOT_CONNECTED: &str = "Python server not connected";

/// A frame received from a browser client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Poll for the current upstream status.
    GetStatus,
    /// Control command. The raw string is kept so unknown commands can be
    /// ignored instead of failing the whole frame.
    Command {
        /// Command string, e.g. `start-recording`.
        #[serde(default)]
        command: Option<String>,
    },
    /// One pointer sample. Numbers are kept exactly as the client sent them.
    MouseMove {
        /// Horizontal position.
        x: Number,
        /// Vertical position.
        y: Number,
        /// Client timestamp.
        t: Number,
    },
    /// Any other `type`.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode a text frame.
    ///
    /// Fails for non-JSON ([`ProtocolError::NotJson`]) and non-object frames,
    /// frames without a string `type`, and known types whose fields have the
    /// wrong shape.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::NotJson)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        if !value.get("type").is_some_and(Value::is_string) {
            return Err(ProtocolError::MissingType);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetStatus => "get-status",
            Self::Command { .. } => "command",
            Self::MouseMove { .. } => "mouse-move",
            Self::Unknown => "unknown",
        }
    }
}

/// An event the relay itself originates for browser clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayEvent {
    /// Current backend connectivity.
    PythonStatus {
        /// Link status.
        status: UpstreamStatus,
    },
    /// Global recording flag changed.
    RecordingStatus {
        /// New flag value.
        recording: bool,
    },
    /// A failure surfaced to the requesting client.
    Error {
        /// Human-readable message.
        message: String,
    },
}

impl RelayEvent {
    /// Status event for the given link state.
    pub fn status(status: UpstreamStatus) -> Self {
        Self::PythonStatus { status }
    }

    /// Error sent when `generate-heatmap` arrives without a backend.
    pub fn upstream_not_connected() -> Self {
        Self::Error {
            message: UPSTREAM_NOT_CONNECTED.to_owned(),
        }
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire `type` value, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PythonStatus { .. } => "python-status",
            Self::RecordingStatus { .. } => "recording-status",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decode_get_status() {
        let msg = ClientMessage::decode(r#"{"type":"get-status"}"#).unwrap();
        assert_eq!(msg, ClientMessage::GetStatus);
    }

    #[test]
    fn decode_get_status_ignores_extra_fields() {
        let msg = ClientMessage::decode(r#"{"type":"get-status","verbose":true}"#).unwrap();
        assert_eq!(msg, ClientMessage::GetStatus);
    }

    #[test]
    fn decode_command() {
        let msg = ClientMessage::decode(r#"{"type":"command","command":"start-recording"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Command {
                command: Some("start-recording".into())
            }
        );
    }

    #[test]
    fn decode_command_without_command_field() {
        let msg = ClientMessage::decode(r#"{"type":"command"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Command { command: None });
    }

    #[test]
    fn decode_mouse_move_keeps_integer_numbers() {
        let msg = ClientMessage::decode(r#"{"type":"mouse-move","x":1,"y":2,"t":100}"#).unwrap();
        let ClientMessage::MouseMove { x, y, t } = msg else {
            panic!("expected mouse-move");
        };
        assert_eq!(x.to_string(), "1");
        assert_eq!(y.to_string(), "2");
        assert_eq!(t.to_string(), "100");
    }

    #[test]
    fn decode_mouse_move_floats() {
        let msg =
            ClientMessage::decode(r#"{"type":"mouse-move","x":10.5,"y":-3.25,"t":1700000000000}"#)
                .unwrap();
        assert_matches!(msg, ClientMessage::MouseMove { .. });
    }

    #[test]
    fn decode_mouse_move_missing_field_fails() {
        let err = ClientMessage::decode(r#"{"type":"mouse-move","x":1,"y":2}"#).unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn decode_mouse_move_string_coordinate_fails() {
        let err =
            ClientMessage::decode(r#"{"type":"mouse-move","x":"1","y":2,"t":3}"#).unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn decode_unknown_type() {
        let msg = ClientMessage::decode(r#"{"type":"resize","w":10}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn decode_non_json_fails() {
        assert_matches!(
            ClientMessage::decode("1,2,100"),
            Err(ProtocolError::NotJson(_))
        );
    }

    #[test]
    fn decode_array_fails() {
        assert_matches!(
            ClientMessage::decode(r#"["get-status"]"#),
            Err(ProtocolError::NotAnObject)
        );
    }

    #[test]
    fn decode_missing_type_fails() {
        assert_matches!(
            ClientMessage::decode(r#"{"x":1,"y":2,"t":3}"#),
            Err(ProtocolError::MissingType)
        );
        assert_matches!(
            ClientMessage::decode(r#"{"type":5}"#),
            Err(ProtocolError::MissingType)
        );
    }

    #[test]
    fn kind_labels() {
        assert_eq!(ClientMessage::GetStatus.kind(), "get-status");
        assert_eq!(ClientMessage::Unknown.kind(), "unknown");
    }

    #[test]
    fn encode_python_status() {
        let json = RelayEvent::status(UpstreamStatus::Disconnected).encode().unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, json!({"type": "python-status", "status": "disconnected"}));
    }

    #[test]
    fn encode_recording_status() {
        let json = RelayEvent::RecordingStatus { recording: true }.encode().unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, json!({"type": "recording-status", "recording": true}));
    }

    #[test]
    fn encode_not_connected_error() {
        let json = RelayEvent::upstream_not_connected().encode().unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed,
            json!({"type": "error", "message": "Python server not connected"})
        );
    }

    #[test]
    fn relay_event_kind_matches_wire_type() {
        for event in [
            RelayEvent::status(UpstreamStatus::Connected),
            RelayEvent::RecordingStatus { recording: false },
            RelayEvent::upstream_not_connected(),
        ] {
            let parsed: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
            assert_eq!(parsed["type"], event.kind());
        }
    }
}
