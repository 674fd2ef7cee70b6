//! Server and upstream link configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the browser-facing listeners.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// WebSocket port (default `3001`, `0` for auto-assign).
    pub port: u16,
    /// Static asset port (default `3000`). Only bound when `public_dir` is set.
    pub http_port: u16,
    /// Front-end asset directory.
    pub public_dir: Option<PathBuf>,
    /// Outbound queue depth per browser client.
    pub client_send_queue: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a silent client after this many milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Delay before a new client receives its first status, in milliseconds.
    pub initial_status_delay_ms: u64,
    /// Forward undecodable browser frames upstream while recording.
    pub forward_raw_frames: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            http_port: 3000,
            public_dir: None,
            client_send_queue: 256,
            max_message_size: 1024 * 1024, // 1 MiB
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            initial_status_delay_ms: 100,
            forward_raw_frames: false,
        }
    }
}

impl ServerConfig {
    /// Bind address of the WebSocket listener.
    pub fn ws_addr(&self) -> String {
        bind_addr(&self.host, self.port)
    }

    /// Bind address of the static asset listener.
    pub fn http_addr(&self) -> String {
        bind_addr(&self.host, self.http_port)
    }

    /// Heartbeat ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Heartbeat silence timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Delay before the initial status message.
    pub fn initial_status_delay(&self) -> Duration {
        Duration::from_millis(self.initial_status_delay_ms)
    }
}

/// Configuration for the backend link.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Backend WebSocket URL.
    pub url: String,
    /// Fixed delay before reconnecting, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Per-attempt connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Outbound queue depth for the backend socket.
    pub send_queue: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5000".into(),
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 10_000,
            send_queue: 1024,
        }
    }
}

impl UpstreamConfig {
    /// Delay between a disconnect and the next attempt.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Per-attempt connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn bind_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
