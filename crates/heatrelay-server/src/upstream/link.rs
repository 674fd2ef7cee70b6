//! Upstream link manager.
//!
//! Owns the one connection to the backend. [`UpstreamLink::run`] loops for
//! the life of the process:
//!
//! ```text
//! connecting ─► connected ─► disconnected ─► (reconnect delay) ─► connecting
//!      │             │
//!      └─────────────┴─► error ─► disconnected
//! ```
//!
//! A failed attempt or a broken socket reports `error` and then
//! `disconnected`; a clean close reports `disconnected` only. Every
//! transition is broadcast to all registered clients while the state lock is
//! held, so clients see transitions in the order they happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use heatrelay_protocol::{RelayEvent, UpstreamFrame, UpstreamStatus};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connector::{Connector, UpstreamTransport};
use crate::config::UpstreamConfig;
use crate::errors::LinkError;
use crate::metrics::{
    MALFORMED_FRAMES_TOTAL, UPSTREAM_CONNECTED, UPSTREAM_CONNECTS_TOTAL,
    UPSTREAM_DISCONNECTS_TOTAL, UPSTREAM_FRAMES_FORWARDED_TOTAL,
};
use crate::websocket::{Broadcaster, ClientConnection};

struct LinkState {
    status: UpstreamStatus,
    /// Present only while `status` is `Connected`.
    outbound: Option<mpsc::Sender<String>>,
}

/// The single backend connection and its status.
pub struct UpstreamLink {
    connector: Arc<dyn Connector>,
    config: UpstreamConfig,
    broadcaster: Broadcaster,
    state: Mutex<LinkState>,
    started: AtomicBool,
}

impl UpstreamLink {
    /// Create a link in the `disconnected` state. Nothing connects until
    /// [`run`](Self::run) is spawned.
    pub fn new(
        connector: Arc<dyn Connector>,
        config: UpstreamConfig,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            connector,
            config,
            broadcaster,
            state: Mutex::new(LinkState {
                status: UpstreamStatus::Disconnected,
                outbound: None,
            }),
            started: AtomicBool::new(false),
        }
    }

    /// Current link status.
    pub fn status(&self) -> UpstreamStatus {
        self.state.lock().status
    }

    /// Whether the backend is reachable right now.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Backend endpoint, for logs and health output.
    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    /// Queue the current status for one client.
    ///
    /// The status is read and queued under the state lock, so the reply
    /// cannot land after a newer transition broadcast.
    pub fn send_status(&self, conn: &ClientConnection) -> bool {
        let state = self.state.lock();
        self.broadcaster.unicast(&RelayEvent::status(state.status), conn)
    }

    /// Queue a text frame for the backend.
    ///
    /// Returns `false` without buffering when the link is not connected or
    /// its queue is full.
    pub fn send(&self, payload: String) -> bool {
        let state = self.state.lock();
        if !state.status.is_connected() {
            return false;
        }
        state
            .outbound
            .as_ref()
            .is_some_and(|tx| tx.try_send(payload).is_ok())
    }

    /// Drive the connect / pump / reconnect loop until `cancel` fires.
    ///
    /// Only the first call runs the loop; later calls return immediately, so
    /// there is never more than one backend socket.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("upstream link already running");
            return;
        }
        info!(url = self.endpoint(), "upstream link started");

        loop {
            self.transition(UpstreamStatus::Connecting, None);

            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                outcome = self.connect_and_pump() => outcome,
            };
            match outcome {
                Ok(()) => info!(url = self.endpoint(), "upstream closed"),
                Err(e) => {
                    warn!(url = self.endpoint(), error = %e, "upstream link failed");
                    self.transition(UpstreamStatus::Error, None);
                }
            }
            counter!(UPSTREAM_DISCONNECTS_TOTAL).increment(1);
            self.transition(UpstreamStatus::Disconnected, None);

            let delay = self.config.reconnect_delay();
            debug!(delay_ms = delay.as_millis(), "scheduling upstream reconnect");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        if self.status() != UpstreamStatus::Disconnected {
            self.transition(UpstreamStatus::Disconnected, None);
        }
        info!("upstream link stopped");
    }

    /// One connection attempt and, on success, the frame pump.
    ///
    /// `Ok` means the backend closed cleanly.
    async fn connect_and_pump(&self) -> Result<(), LinkError> {
        let timeout = self.config.connect_timeout();
        let UpstreamTransport {
            mut sink,
            mut stream,
        } = tokio::time::timeout(timeout, self.connector.connect())
            .await
            .map_err(|_| LinkError::Timeout(timeout))??;

        let (tx, mut rx) = mpsc::channel::<String>(self.config.send_queue.max(1));
        self.transition(UpstreamStatus::Connected, Some(tx));
        counter!(UPSTREAM_CONNECTS_TOTAL).increment(1);
        info!(url = self.endpoint(), "upstream connected");

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(text),
                    Some(Err(e)) => return Err(e),
                    None => return Ok(()),
                },
                Some(payload) = rx.recv() => sink.send(payload).await?,
            }
        }
    }

    fn handle_frame(&self, text: String) {
        match UpstreamFrame::classify(&text) {
            Ok(UpstreamFrame::Forward { kind }) => {
                let delivery = self.broadcaster.broadcast_raw(Arc::new(text));
                counter!(UPSTREAM_FRAMES_FORWARDED_TOTAL).increment(1);
                debug!(
                    %kind,
                    recipients = delivery.attempted,
                    "forwarded upstream frame"
                );
            }
            Ok(UpstreamFrame::Ignore { kind }) => {
                debug!(kind = kind.as_deref().unwrap_or("<none>"), "ignoring upstream frame");
            }
            Err(e) => {
                counter!(MALFORMED_FRAMES_TOTAL, "source" => "upstream").increment(1);
                warn!(error = %e, len = text.len(), "discarding malformed upstream frame");
            }
        }
    }

    fn transition(&self, status: UpstreamStatus, outbound: Option<mpsc::Sender<String>>) {
        let mut state = self.state.lock();
        state.status = status;
        state.outbound = outbound;
        gauge!(UPSTREAM_CONNECTED).set(if status.is_connected() { 1.0 } else { 0.0 });
        let delivery = self.broadcaster.broadcast(&RelayEvent::status(status));
        info!(
            %status,
            recipients = delivery.attempted,
            dropped = delivery.dropped(),
            "upstream status changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::task::JoinHandle;

    use crate::upstream::testing::MockConnector;
    use crate::websocket::{ClientConnection, ClientRegistry};

    struct Harness {
        link: Arc<UpstreamLink>,
        connector: Arc<MockConnector>,
        client_rx: mpsc::Receiver<Arc<String>>,
        cancel: CancellationToken,
    }

    fn harness(connect_timeout_ms: u64) -> Harness {
        let registry = Arc::new(ClientRegistry::new());
        let (tx, client_rx) = mpsc::channel(64);
        registry.add(Arc::new(ClientConnection::new("c1".into(), tx)));
        let connector = Arc::new(MockConnector::new());
        let config = UpstreamConfig {
            connect_timeout_ms,
            ..UpstreamConfig::default()
        };
        let link = Arc::new(UpstreamLink::new(
            connector.clone(),
            config,
            Broadcaster::new(registry),
        ));
        Harness {
            link,
            connector,
            client_rx,
            cancel: CancellationToken::new(),
        }
    }

    impl Harness {
        fn spawn(&self) -> JoinHandle<()> {
            tokio::spawn(self.link.clone().run(self.cancel.clone()))
        }

        async fn next_frame(&mut self) -> String {
            let frame = tokio::time::timeout(Duration::from_secs(60), self.client_rx.recv())
                .await
                .expect("timed out waiting for frame")
                .expect("client channel closed");
            (*frame).clone()
        }

        async fn next_status(&mut self) -> UpstreamStatus {
            let frame = self.next_frame().await;
            match serde_json::from_str::<RelayEvent>(&frame).unwrap() {
                RelayEvent::PythonStatus { status } => status,
                other => panic!("expected python-status, got {other:?}"),
            }
        }
    }

    #[test]
    fn starts_disconnected() {
        let h = harness(10_000);
        assert_eq!(h.link.status(), UpstreamStatus::Disconnected);
        assert!(!h.link.send("x".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn connects_and_reports_status() {
        let mut h = harness(10_000);
        let _backend = h.connector.accept();
        let handle = h.spawn();

        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Connected);
        assert!(h.link.is_connected());

        h.cancel.cancel();
        handle.await.unwrap();
        assert_eq!(h.next_status().await, UpstreamStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_reports_error_then_retries() {
        let mut h = harness(10_000);
        h.connector.refuse();
        let _backend = h.connector.accept();
        let handle = h.spawn();

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(h.next_status().await);
        }
        assert_eq!(
            seen,
            vec![
                UpstreamStatus::Connecting,
                UpstreamStatus::Error,
                UpstreamStatus::Disconnected,
                UpstreamStatus::Connecting,
                UpstreamStatus::Connected,
            ]
        );

        h.cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_waits_for_delay() {
        let mut h = harness(10_000);
        h.connector.refuse();
        let _backend = h.connector.accept();
        let handle = h.spawn();

        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Error);
        assert_eq!(h.next_status().await, UpstreamStatus::Disconnected);
        let down_at = tokio::time::Instant::now();
        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert!(down_at.elapsed() >= Duration::from_millis(3000));

        h.cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn clean_close_reports_disconnected_without_error() {
        let mut h = harness(10_000);
        let backend = h.connector.accept();
        let _second = h.connector.accept();
        let handle = h.spawn();

        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Connected);
        drop(backend);
        assert_eq!(h.next_status().await, UpstreamStatus::Disconnected);
        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Connected);

        h.cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_reports_error() {
        let mut h = harness(10_000);
        let backend = h.connector.accept();
        let handle = h.spawn();

        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Connected);
        backend.fail();
        assert_eq!(h.next_status().await, UpstreamStatus::Error);
        assert_eq!(h.next_status().await, UpstreamStatus::Disconnected);
        assert!(!h.link.send("dropped".into()));

        h.cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn connect_timeout_counts_as_error() {
        let mut h = harness(500);
        // Nothing scripted: the attempt hangs until the timeout.
        let handle = h.spawn();

        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Error);
        assert_eq!(h.next_status().await, UpstreamStatus::Disconnected);

        h.cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn send_reaches_backend_only_when_connected() {
        let mut h = harness(10_000);
        assert!(!h.link.send("early".into()));

        let mut backend = h.connector.accept();
        let handle = h.spawn();
        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Connected);

        assert!(h.link.send(r#"{"x":1,"y":2,"t":3}"#.into()));
        let got = tokio::time::timeout(Duration::from_secs(1), backend.from_relay.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, r#"{"x":1,"y":2,"t":3}"#);

        h.cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_only_relayable_frames_verbatim() {
        let mut h = harness(10_000);
        let backend = h.connector.accept();
        let handle = h.spawn();
        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Connected);

        backend.push("not json");
        backend.push(r#"{"type":"progress","pct":50}"#);
        backend.push(r#"{"no_type":true}"#);
        let heatmap = r#"{"type":"heatmap-generated","image":"data:image/png;base64,AAA","points":3}"#;
        backend.push(heatmap);

        assert_eq!(h.next_frame().await, heatmap);
        // Malformed input did not drop the link.
        assert!(h.link.is_connected());

        h.cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_is_a_noop() {
        let mut h = harness(10_000);
        let _backend = h.connector.accept();
        let first = h.spawn();
        assert_eq!(h.next_status().await, UpstreamStatus::Connecting);
        assert_eq!(h.next_status().await, UpstreamStatus::Connected);

        // Returns at once without touching the live link.
        h.link.clone().run(h.cancel.clone()).await;
        assert!(h.link.is_connected());
        assert!(h.client_rx.try_recv().is_err());

        h.cancel.cancel();
        first.await.unwrap();
    }
}
