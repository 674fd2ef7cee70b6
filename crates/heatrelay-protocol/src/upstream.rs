//! Envelopes exchanged with the analysis backend.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::command::Command;
use crate::errors::{ProtocolError, Result};

/// Backend frame types that are fanned out to every browser client.
pub const FORWARDED_TYPES: [&str; 3] = ["heatmap-generated", "recording-status", "error"];

/// A typed message the relay sends to the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UpstreamMessage {
    /// Forwarded control command.
    Command {
        /// Command being forwarded.
        command: Command,
    },
}

impl UpstreamMessage {
    /// Wrap a command for the backend.
    pub fn command(command: Command) -> Self {
        Self::Command { command }
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A pointer sample forwarded while recording.
///
/// Deliberately untyped on the wire: the backend tells samples apart from
/// commands by shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Horizontal position.
    pub x: Number,
    /// Vertical position.
    pub y: Number,
    /// Client timestamp.
    pub t: Number,
}

impl TelemetrySample {
    /// Serialize to a text frame containing exactly `x`, `y` and `t`.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// How the relay should treat a frame received from the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamFrame {
    /// Broadcast the frame, unchanged, to every browser client.
    Forward {
        /// The frame's `type`.
        kind: String,
    },
    /// Drop the frame. `kind` is `None` when the object had no string `type`.
    Ignore {
        /// The frame's `type`, if any.
        kind: Option<String>,
    },
}

impl UpstreamFrame {
    /// Classify a backend text frame.
    ///
    /// Non-JSON frames are an error; valid JSON that is not a forwardable
    /// typed object is ignored.
    pub fn classify(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::NotJson)?;
        let kind = value.get("type").and_then(Value::as_str);
        Ok(match kind {
            Some(k) if FORWARDED_TYPES.contains(&k) => Self::Forward { kind: k.to_owned() },
            other => Self::Ignore {
                kind: other.map(str::to_owned),
            },
        })
    }
}
