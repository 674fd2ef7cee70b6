//! Fan-out to registered browser clients.

use std::sync::Arc;

use heatrelay_protocol::RelayEvent;
use metrics::counter;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::registry::ClientRegistry;
use crate::metrics::BROADCAST_DROPS_TOTAL;

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Open clients a send was attempted for.
    pub attempted: usize,
    /// Sends that were queued.
    pub delivered: usize,
    /// Registered clients skipped because they were no longer open.
    pub skipped: usize,
}

impl Delivery {
    /// Attempted sends that were dropped on a full queue.
    pub fn dropped(&self) -> usize {
        self.attempted - self.delivered
    }
}

/// Serializes once and delivers to every open client.
///
/// Sends never block; a full client queue drops the message for that client
/// only.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this broadcaster delivers to.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Broadcast a relay-originated event to all clients.
    pub fn broadcast(&self, event: &RelayEvent) -> Delivery {
        let json = match event.encode() {
            Ok(j) => j,
            Err(e) => {
                warn!(event_type = event.kind(), error = %e, "failed to serialize event");
                return Delivery::default();
            }
        };
        let delivery = self.broadcast_raw(Arc::new(json));
        debug!(
            event_type = event.kind(),
            recipients = delivery.attempted,
            skipped = delivery.skipped,
            "broadcast event to all"
        );
        delivery
    }

    /// Broadcast an already-encoded frame, unchanged, to all clients.
    pub fn broadcast_raw(&self, frame: Arc<String>) -> Delivery {
        let mut delivery = Delivery::default();
        self.registry.for_each(|conn| {
            if !conn.is_open() {
                delivery.skipped += 1;
                return;
            }
            delivery.attempted += 1;
            if conn.send(frame.clone()) {
                delivery.delivered += 1;
            } else {
                counter!(BROADCAST_DROPS_TOTAL).increment(1);
                warn!(conn_id = %conn.id, "client queue full, dropping message");
            }
        });
        delivery
    }

    /// Send an event to a single client.
    pub fn unicast(&self, event: &RelayEvent, conn: &ClientConnection) -> bool {
        let json = match event.encode() {
            Ok(j) => j,
            Err(e) => {
                warn!(event_type = event.kind(), error = %e, "failed to serialize event");
                return false;
            }
        };
        if !conn.is_open() {
            return false;
        }
        let sent = conn.send(Arc::new(json));
        if !sent {
            counter!(BROADCAST_DROPS_TOTAL).increment(1);
            debug!(conn_id = %conn.id, event_type = event.kind(), "unicast dropped");
        }
        sent
    }
}
