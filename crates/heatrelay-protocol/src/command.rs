//! Control command vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A control command a browser client may issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    /// Turn the global recording gate on.
    StartRecording,
    /// Turn the global recording gate off.
    StopRecording,
    /// Ask the backend to render a heatmap from recorded samples.
    GenerateHeatmap,
}

impl Command {
    /// Parse a wire command string. Unrecognized strings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start-recording" => Some(Self::StartRecording),
            "stop-recording" => Some(Self::StopRecording),
            "generate-heatmap" => Some(Self::GenerateHeatmap),
            _ => None,
        }
    }

    /// Wire string for this command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartRecording => "start-recording",
            Self::StopRecording => "stop-recording",
            Self::GenerateHeatmap => "generate-heatmap",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_commands() {
        assert_eq!(Command::parse("start-recording"), Some(Command::StartRecording));
        assert_eq!(Command::parse("stop-recording"), Some(Command::StopRecording));
        assert_eq!(Command::parse("generate-heatmap"), Some(Command::GenerateHeatmap));
    }

    #[test]
    fn parse_unknown_is_none() {
        assert_eq!(Command::parse("reset"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("START-RECORDING"), None);
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&Command::GenerateHeatmap).unwrap();
        assert_eq!(json, "\"generate-heatmap\"");
        let back: Command = serde_json::from_str("\"stop-recording\"").unwrap();
        assert_eq!(back, Command::StopRecording);
    }
}
