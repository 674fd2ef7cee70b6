//! Scripted connector for link and relay tests.

use async_trait::async_trait;
use futures::SinkExt;
use futures::channel::mpsc as fmpsc;
use tokio::sync::{Mutex, mpsc};

use super::connector::{Connector, UpstreamTransport};
use crate::errors::LinkError;

/// Backend side of a scripted transport.
pub(crate) struct FakeBackend {
    /// Frames delivered to the relay. Dropping it closes the link cleanly.
    pub to_relay: fmpsc::UnboundedSender<Result<String, LinkError>>,
    /// Frames the relay sent.
    pub from_relay: fmpsc::UnboundedReceiver<String>,
}

impl FakeBackend {
    /// Deliver a text frame to the relay.
    pub fn push(&self, frame: &str) {
        self.to_relay.unbounded_send(Ok(frame.to_owned())).unwrap();
    }

    /// Fail the transport.
    pub fn fail(&self) {
        self.to_relay.unbounded_send(Err(LinkError::Closed)).unwrap();
    }
}

/// Build a connected transport and its backend end.
pub(crate) fn transport_pair() -> (UpstreamTransport, FakeBackend) {
    let (to_relay, stream) = fmpsc::unbounded();
    let (sink_tx, from_relay) = fmpsc::unbounded::<String>();
    let sink = sink_tx.sink_map_err(|_| LinkError::Closed);
    let transport = UpstreamTransport {
        sink: Box::pin(sink),
        stream: Box::pin(stream),
    };
    (transport, FakeBackend { to_relay, from_relay })
}

/// Hands out scripted connection outcomes in order. With nothing scripted,
/// `connect` waits until an outcome is pushed.
pub(crate) struct MockConnector {
    tx: mpsc::UnboundedSender<Result<UpstreamTransport, LinkError>>,
    rx: Mutex<mpsc::UnboundedReceiver<Result<UpstreamTransport, LinkError>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Script a failed attempt.
    pub fn refuse(&self) {
        let _ = self.tx.send(Err(LinkError::Closed));
    }

    /// Script a successful attempt, returning the backend end.
    pub fn accept(&self) -> FakeBackend {
        let (transport, backend) = transport_pair();
        let _ = self.tx.send(Ok(transport));
        backend
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<UpstreamTransport, LinkError> {
        match self.rx.lock().await.recv().await {
            Some(outcome) => outcome,
            None => futures::future::pending().await,
        }
    }

    fn endpoint(&self) -> &str {
        "mock://backend"
    }
}
