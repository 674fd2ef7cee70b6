//! Command-line flags and the settings → server config mapping.

use std::path::PathBuf;

use clap::Parser;
use heatrelay_server::{ServerConfig, UpstreamConfig};
use heatrelay_settings::{LogFormat, RelaySettings};

/// WebSocket relay between heatmap browser clients and the analysis backend.
#[derive(Parser, Debug)]
#[command(name = "heatrelay", version, about)]
pub struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    pub host: Option<String>,

    /// WebSocket port (0 for auto-assign).
    #[arg(long)]
    pub port: Option<u16>,

    /// Static asset port.
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Backend WebSocket URL.
    #[arg(long)]
    pub upstream_url: Option<String>,

    /// Directory of front-end assets to serve.
    #[arg(long)]
    pub public_dir: Option<PathBuf>,

    /// Settings file (default `~/.heatrelay/settings.json`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `heatrelay_server=trace`.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Apply flags on top of loaded settings.
    pub fn apply(&self, settings: &mut RelaySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.ws_port = port;
        }
        if let Some(port) = self.http_port {
            settings.server.http_port = port;
        }
        if let Some(ref url) = self.upstream_url {
            settings.upstream.url.clone_from(url);
        }
        if let Some(ref dir) = self.public_dir {
            settings.server.public_dir = Some(dir.display().to_string());
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

/// Listener config from settings.
pub fn server_config(settings: &RelaySettings) -> ServerConfig {
    let s = &settings.server;
    ServerConfig {
        host: s.host.clone(),
        port: s.ws_port,
        http_port: s.http_port,
        public_dir: s.public_dir.as_ref().map(PathBuf::from),
        client_send_queue: s.client_send_queue,
        max_message_size: s.max_message_size,
        heartbeat_interval_ms: s.heartbeat_interval_ms,
        heartbeat_timeout_ms: s.heartbeat_timeout_ms,
        initial_status_delay_ms: s.initial_status_delay_ms,
        forward_raw_frames: s.forward_raw_frames,
    }
}

/// Backend link config from settings.
pub fn upstream_config(settings: &RelaySettings) -> UpstreamConfig {
    let u = &settings.upstream;
    UpstreamConfig {
        url: u.url.clone(),
        reconnect_delay_ms: u.reconnect_delay_ms,
        connect_timeout_ms: u.connect_timeout_ms,
        send_queue: u.send_queue,
    }
}
