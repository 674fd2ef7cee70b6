//! Settings types.
//!
//! All structs use `#[serde(default)]` so a partial settings file only
//! needs to name the keys it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener and per-client settings.
    pub server: ServerSettings,
    /// Backend link settings.
    pub upstream: UpstreamSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let url = self.upstream.url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SettingsError::InvalidValue(format!(
                "upstream.url must start with ws:// or wss://, got {url:?}"
            )));
        }
        if self.upstream.reconnect_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "upstream.reconnectDelayMs must be greater than zero".into(),
            ));
        }
        if self.upstream.connect_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "upstream.connectTimeoutMs must be greater than zero".into(),
            ));
        }
        if self.upstream.send_queue == 0 || self.server.client_send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "send queues must hold at least one message".into(),
            ));
        }
        if self.server.heartbeat_timeout_ms < self.server.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutMs ({}) is shorter than heartbeatIntervalMs ({})",
                self.server.heartbeat_timeout_ms, self.server.heartbeat_interval_ms
            )));
        }
        if self.server.public_dir.is_some() && self.server.http_port == self.server.ws_port {
            return Err(SettingsError::InvalidValue(
                "server.httpPort and server.wsPort must differ when serving static files".into(),
            ));
        }
        Ok(())
    }
}

/// Browser-facing listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address for both listeners.
    pub host: String,
    /// WebSocket listener port.
    pub ws_port: u16,
    /// Static asset listener port (only bound when `public_dir` is set).
    pub http_port: u16,
    /// Directory of front-end assets to serve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<String>,
    /// Outbound queue depth per browser client.
    pub client_send_queue: usize,
    /// Largest inbound frame accepted from a browser, in bytes.
    pub max_message_size: usize,
    /// Ping interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a client that has been silent this long, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Delay before the first status message to a new client, in milliseconds.
    pub initial_status_delay_ms: u64,
    /// Forward undecodable browser frames upstream unchanged while recording.
    pub forward_raw_frames: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ws_port: 3001,
            http_port: 3000,
            public_dir: None,
            client_send_queue: 256,
            max_message_size: 1024 * 1024,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            initial_status_delay_ms: 100,
            forward_raw_frames: false,
        }
    }
}

/// Backend link settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSettings {
    /// WebSocket URL of the analysis backend.
    pub url: String,
    /// Fixed delay between a disconnect and the next attempt, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Give up on a single connection attempt after this long, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Outbound queue depth for the backend socket.
    pub send_queue: usize,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5000".to_string(),
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 10_000,
            send_queue: 1024,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
