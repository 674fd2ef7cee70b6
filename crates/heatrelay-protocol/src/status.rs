//! Upstream connectivity as reported to browser clients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection state of the single backend link.
///
/// The relay starts `Disconnected` and then cycles
/// `Connecting → Connected → (Disconnected | Error) → Connecting` for the
/// life of the process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamStatus {
    /// A connection attempt is in flight.
    Connecting,
    /// The backend socket is open.
    Connected,
    /// The backend closed the socket (or no attempt has been made yet).
    #[default]
    Disconnected,
    /// The last attempt or the live socket failed.
    Error,
}

impl UpstreamStatus {
    /// Wire string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }

    /// Whether payloads may be sent upstream.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for UpstreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
