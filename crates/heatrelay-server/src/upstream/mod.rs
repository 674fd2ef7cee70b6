//! The single link to the analysis backend.

pub mod connector;
pub mod link;

#[cfg(test)]
pub(crate) mod testing;

pub use connector::{Connector, FrameSink, FrameStream, UpstreamTransport, WsConnector};
pub use link::UpstreamLink;
