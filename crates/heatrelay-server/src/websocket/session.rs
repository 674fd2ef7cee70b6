//! Browser session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, instrument, trace, warn};

use super::connection::ClientConnection;
use crate::config::ServerConfig;
use crate::metrics::{
    CLIENT_CONNECTIONS_TOTAL, CLIENT_DISCONNECTIONS_TOTAL, CLIENT_SESSION_DURATION_SECONDS,
    CLIENTS_ACTIVE,
};
use crate::relay::Relay;

/// Time the writer gets to flush a close frame once the reader has ended.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session knobs taken from [`ServerConfig`].
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Outbound queue depth.
    pub send_queue: usize,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Silence after which the client is dropped.
    pub pong_timeout: Duration,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            send_queue: config.client_send_queue.max(1),
            ping_interval: config.heartbeat_interval().max(Duration::from_millis(1)),
            pong_timeout: config.heartbeat_timeout(),
        }
    }
}

/// Run a session for one browser client.
///
/// 1. Registers the client and schedules its initial status
/// 2. Forwards queued frames to the socket and pings on an interval
/// 3. Hands every inbound text frame to the relay
/// 4. Ends on close, socket error, heartbeat timeout or shutdown
/// 5. Removes the client from the registry
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: String,
    relay: Arc<Relay>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));
    let registry = relay.broadcaster().registry().clone();

    let started = Instant::now();
    counter!(CLIENT_CONNECTIONS_TOTAL).increment(1);
    gauge!(CLIENTS_ACTIVE).increment(1.0);
    registry.add(connection.clone());
    info!(clients = registry.len(), "client connected");

    relay.on_client_connected(connection.clone());

    // Cancelled by shutdown, a heartbeat timeout, or the reader ending.
    let hangup = shutdown.child_token();

    let writer_conn = connection.clone();
    let writer_hangup = hangup.clone();
    let mut writer = tokio::spawn(
        async move {
            let mut ping_interval = tokio::time::interval(config.ping_interval);
            // Skip the immediate first tick
            let _ = ping_interval.tick().await;

            loop {
                tokio::select! {
                    msg = send_rx.recv() => {
                        let Some(text) = msg else { break };
                        if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                            writer_conn.mark_closed();
                            break;
                        }
                    }
                    _ = ping_interval.tick() => {
                        if !writer_conn.check_alive()
                            && writer_conn.last_pong_elapsed() > config.pong_timeout
                        {
                            warn!(timeout = ?config.pong_timeout, "client unresponsive, disconnecting");
                            writer_conn.mark_closed();
                            let _ = ws_tx.send(Message::Close(None)).await;
                            writer_hangup.cancel();
                            break;
                        }
                        if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            writer_conn.mark_closed();
                            break;
                        }
                    }
                    () = writer_hangup.cancelled() => {
                        writer_conn.mark_closed();
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
        .instrument(Span::current()),
    );

    loop {
        let next = tokio::select! {
            () = hangup.cancelled() => break,
            next = ws_rx.next() => next,
        };
        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "client socket error");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        let text = match msg {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => text.to_owned(),
                Err(_) => {
                    warn!(len = data.len(), "discarding non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let dispatch = relay.handle_client_frame(&connection, &text);
        trace!(?dispatch, "frame handled");
    }

    // Clean up
    hangup.cancel();
    let _ = registry.remove(&conn_id);
    counter!(CLIENT_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(CLIENTS_ACTIVE).decrement(1.0);
    histogram!(CLIENT_SESSION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
    info!(
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "client disconnected"
    );
}
