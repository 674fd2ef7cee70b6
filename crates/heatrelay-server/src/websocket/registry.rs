//! Set of registered browser clients.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::connection::ClientConnection;

/// Registered clients indexed by connection ID.
///
/// A client is added when its socket is accepted and removed when its reader
/// loop ends. Failed sends never remove a client.
#[derive(Default)]
pub struct ClientRegistry {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID, returning it if it was registered.
    pub fn remove(&self, connection_id: &str) -> Option<Arc<ClientConnection>> {
        self.connections.write().remove(connection_id)
    }

    /// Look up a connection by ID.
    pub fn get(&self, connection_id: &str) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(connection_id).cloned()
    }

    /// Whether a connection is registered.
    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.read().contains_key(connection_id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Run `f` against every registered connection while holding the read lock.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<ClientConnection>)) {
        for conn in self.connections.read().values() {
            f(conn);
        }
    }
}
