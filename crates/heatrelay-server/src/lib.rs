//! # heatrelay-server
//!
//! Axum `WebSocket` relay between browser clients and the heatmap backend.
//!
//! - Upstream link: one backend socket, fixed-delay reconnect, status tracking
//! - `WebSocket` gateway: client registry, heartbeat, frame dispatch
//! - Fan-out of backend events and status changes to every open client
//! - Global recording flag gating telemetry forwarding
//! - HTTP endpoints: health check, Prometheus metrics, optional static assets
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod upstream;
pub mod websocket;

pub use config::{ServerConfig, UpstreamConfig};
pub use errors::{LinkError, ServerError};
pub use relay::{Dispatch, Relay, RelayOptions};
pub use server::RelayServer;
pub use shutdown::ShutdownCoordinator;
pub use upstream::{Connector, UpstreamLink, UpstreamTransport, WsConnector};
