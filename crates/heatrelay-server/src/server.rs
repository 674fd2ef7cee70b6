//! `RelayServer`: axum `WebSocket` listener, HTTP endpoints and the static
//! asset listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ServerConfig, UpstreamConfig};
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::relay::{Relay, RelayOptions};
use crate::shutdown::ShutdownCoordinator;
use crate::upstream::{Connector, UpstreamLink, WsConnector};
use crate::websocket::session::{SessionConfig, run_ws_session};
use crate::websocket::{Broadcaster, ClientConnection, ClientRegistry};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broker state.
    pub relay: Arc<Relay>,
    /// Per-session settings.
    pub session: SessionConfig,
    /// Largest inbound frame accepted from a browser.
    pub max_message_size: usize,
    /// Process shutdown token.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl RelayServer {
    /// Wire up the registry, broadcaster, upstream link and relay.
    ///
    /// Nothing is bound or connected until [`listen`](Self::listen) and
    /// [`spawn_upstream`](Self::spawn_upstream) are called.
    pub fn new(
        config: ServerConfig,
        upstream: UpstreamConfig,
        connector: Arc<dyn Connector>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Broadcaster::new(registry);
        let link = Arc::new(UpstreamLink::new(connector, upstream, broadcaster.clone()));
        let options = RelayOptions {
            initial_status_delay: config.initial_status_delay(),
            forward_raw_frames: config.forward_raw_frames,
        };
        Self {
            config,
            relay: Arc::new(Relay::new(link, broadcaster, options)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Server connecting upstream over `WebSocket` to `upstream.url`.
    pub fn with_ws_upstream(
        config: ServerConfig,
        upstream: UpstreamConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let connector = Arc::new(WsConnector::new(upstream.url.clone()));
        Self::new(config, upstream, connector, metrics)
    }

    /// Build the `WebSocket` / health / metrics router.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: self.relay.clone(),
            session: SessionConfig::from(&self.config),
            max_message_size: self.config.max_message_size,
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Router serving `public_dir`, if one is configured.
    pub fn static_router(&self) -> Option<Router> {
        let dir = self.config.public_dir.as_ref()?;
        Some(
            Router::new()
                .fallback_service(ServeDir::new(dir))
                .layer(TraceLayer::new_for_http()),
        )
    }

    /// Bind the `WebSocket` listener and serve until shutdown.
    ///
    /// Returns the bound address and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let (addr, handle) = self.serve(self.config.ws_addr(), self.router()).await?;
        info!(%addr, "relay listening");
        Ok((addr, handle))
    }

    /// Bind the static asset listener when `public_dir` is set.
    pub async fn listen_static(&self) -> Result<Option<(SocketAddr, JoinHandle<()>)>, ServerError> {
        let Some(router) = self.static_router() else {
            return Ok(None);
        };
        let (addr, handle) = self.serve(self.config.http_addr(), router).await?;
        info!(%addr, dir = ?self.config.public_dir, "serving static assets");
        Ok(Some((addr, handle)))
    }

    /// Start the upstream connect / reconnect loop.
    pub fn spawn_upstream(&self) -> JoinHandle<()> {
        tokio::spawn(self.relay.link().clone().run(self.shutdown.token()))
    }

    async fn serve(
        &self,
        addr: String,
        router: Router,
    ) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;
        let local_addr = listener.local_addr()?;
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(%local_addr, error = %e, "listener failed");
            }
        });
        Ok((local_addr, handle))
    }

    /// Broker state.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET / and GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let conn_id = ClientConnection::new_id();
    let token = state.shutdown.token();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, conn_id, state.relay, state.session, token))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let relay = &state.relay;
    Json(health::health_check(
        state.start_time,
        relay.broadcaster().registry().len(),
        relay.upstream_status(),
        relay.is_recording(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
