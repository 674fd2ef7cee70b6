//! # heatrelay-protocol
//!
//! Wire envelopes for the heatmap relay.
//!
//! Two sockets, two directions each:
//!
//! | Direction | Types |
//! |-----------|-------|
//! | browser → relay | [`ClientMessage`] (`get-status`, `command`, `mouse-move`) |
//! | relay → browser | [`RelayEvent`] (`python-status`, `recording-status`, `error`) plus forwarded backend frames |
//! | relay → backend | [`UpstreamMessage`] commands and [`TelemetrySample`] points |
//! | backend → relay | classified by [`UpstreamFrame::classify`] |
//!
//! Every frame is a JSON text frame. Envelopes are built and dropped per
//! message; nothing here performs I/O.

#![deny(unsafe_code)]

pub mod command;
pub mod downstream;
pub mod errors;
pub mod status;
pub mod upstream;

pub use command::Command;
pub use downstream::{ClientMessage, RelayEvent, UPSTREAM_NOT_CONNECTED};
pub use errors::{ProtocolError, Result};
pub use status::UpstreamStatus;
pub use upstream::{FORWARDED_TYPES, TelemetrySample, UpstreamFrame, UpstreamMessage};
