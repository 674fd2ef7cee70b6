//! Error types for the relay server.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures on the backend link. None of these escape the link manager;
/// they drive the reconnect loop and are logged.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The WebSocket handshake with the backend failed.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// Backend URL.
        url: String,
        /// Underlying handshake error.
        #[source]
        source: tungstenite::Error,
    },
    /// The attempt did not complete within the connect timeout.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
    /// The live socket failed.
    #[error("upstream transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    /// The transport went away without an error.
    #[error("upstream transport closed")]
    Closed,
}

/// Startup failures. These are the only fatal errors in the relay.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The listener bound but its address could not be read.
    #[error("failed to read local address: {0}")]
    LocalAddr(#[from] std::io::Error),
    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

impl ServerError {
    pub(crate) fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}
