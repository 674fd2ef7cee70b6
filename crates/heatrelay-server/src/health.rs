//! `/health` endpoint.

use std::time::Instant;

use heatrelay_protocol::UpstreamStatus;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the relay is running.
    pub status: String,
    /// Seconds since the relay started.
    pub uptime_secs: u64,
    /// Registered browser clients.
    pub connections: usize,
    /// Backend link status.
    pub upstream: UpstreamStatus,
    /// Global recording flag.
    pub recording: bool,
}

/// Build a health response from live state.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    upstream: UpstreamStatus,
    recording: bool,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        upstream,
        recording,
    }
}
