//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup before
/// any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants shared by the link, the relay and the sessions.

/// Browser connections accepted (counter).
pub const CLIENT_CONNECTIONS_TOTAL: &str = "relay_client_connections_total";
/// Browser disconnections (counter).
pub const CLIENT_DISCONNECTIONS_TOTAL: &str = "relay_client_disconnections_total";
/// Registered browser clients (gauge).
pub const CLIENTS_ACTIVE: &str = "relay_clients_active";
/// Browser session duration seconds (histogram).
pub const CLIENT_SESSION_DURATION_SECONDS: &str = "relay_client_session_duration_seconds";
/// Browser frames received (counter, labels: kind).
pub const FRAMES_RECEIVED_TOTAL: &str = "relay_frames_received_total";
/// Pointer samples forwarded to the backend (counter).
pub const TELEMETRY_FORWARDED_TOTAL: &str = "relay_telemetry_forwarded_total";
/// Pointer samples dropped by the gate or a down link (counter, labels: reason).
pub const TELEMETRY_DROPPED_TOTAL: &str = "relay_telemetry_dropped_total";
/// Commands handled (counter, labels: command).
pub const COMMANDS_TOTAL: &str = "relay_commands_total";
/// Successful backend connections (counter).
pub const UPSTREAM_CONNECTS_TOTAL: &str = "relay_upstream_connects_total";
/// Backend disconnects and failed attempts (counter, labels: status).
pub const UPSTREAM_DISCONNECTS_TOTAL: &str = "relay_upstream_disconnects_total";
/// Backend link up (gauge). 1 = connected, 0 = anything else.
pub const UPSTREAM_CONNECTED: &str = "relay_upstream_connected";
/// Backend frames forwarded to browsers (counter).
pub const UPSTREAM_FRAMES_FORWARDED_TOTAL: &str = "relay_upstream_frames_forwarded_total";
/// Global recording flag (gauge). 1 = recording.
pub const RECORDING: &str = "relay_recording";
/// Messages dropped because a client queue was full or closed (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "relay_broadcast_drops_total";
/// Frames that failed to decode (counter, labels: source).
pub const MALFORMED_FRAMES_TOTAL: &str = "relay_malformed_frames_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render() {
        // No global install to avoid test conflicts.
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_names_are_prefixed_snake_case() {
        let names = [
            CLIENT_CONNECTIONS_TOTAL,
            CLIENT_DISCONNECTIONS_TOTAL,
            CLIENTS_ACTIVE,
            CLIENT_SESSION_DURATION_SECONDS,
            FRAMES_RECEIVED_TOTAL,
            TELEMETRY_FORWARDED_TOTAL,
            TELEMETRY_DROPPED_TOTAL,
            COMMANDS_TOTAL,
            UPSTREAM_CONNECTS_TOTAL,
            UPSTREAM_DISCONNECTS_TOTAL,
            UPSTREAM_CONNECTED,
            UPSTREAM_FRAMES_FORWARDED_TOTAL,
            RECORDING,
            BROADCAST_DROPS_TOTAL,
            MALFORMED_FRAMES_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("relay_"), "metric '{name}' lacks prefix");
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
