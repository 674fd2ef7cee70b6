//! Browser-facing `WebSocket` side: connections, registry, fan-out and the
//! per-client session loop.

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod session;

pub use broadcast::{Broadcaster, Delivery};
pub use connection::ClientConnection;
pub use registry::ClientRegistry;
