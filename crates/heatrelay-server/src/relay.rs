//! Broker state and browser frame dispatch.
//!
//! [`Relay`] is the one process-wide state container. It owns the global
//! recording flag, the upstream link and the broadcaster. Browser frames come
//! in through [`Relay::handle_client_frame`]:
//!
//! | Frame | Effect |
//! |-------|--------|
//! | `get-status` | current link status to the requester |
//! | `command` | [`Relay::handle_command`] |
//! | `mouse-move` | `{x,y,t}` to the backend iff recording |
//! | anything else | ignored |

use std::sync::Arc;
use std::time::Duration;

use heatrelay_protocol::{
    ClientMessage, Command, ProtocolError, RelayEvent, TelemetrySample, UpstreamMessage,
    UpstreamStatus,
};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde_json::Number;
use tracing::{debug, info, warn};

use crate::metrics::{
    COMMANDS_TOTAL, FRAMES_RECEIVED_TOTAL, MALFORMED_FRAMES_TOTAL, RECORDING,
    TELEMETRY_DROPPED_TOTAL, TELEMETRY_FORWARDED_TOTAL,
};
use crate::upstream::UpstreamLink;
use crate::websocket::{Broadcaster, ClientConnection};

/// Relay behavior knobs.
#[derive(Clone, Debug)]
pub struct RelayOptions {
    /// Delay before a new client receives its first status. Zero sends at once.
    pub initial_status_delay: Duration,
    /// Forward non-JSON browser frames upstream unchanged while recording.
    pub forward_raw_frames: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            initial_status_delay: Duration::from_millis(100),
            forward_raw_frames: false,
        }
    }
}

/// What a browser frame turned into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// `get-status` answered.
    StatusSent,
    /// `command` handled. `None` for a missing or unrecognized command.
    Command(Option<Command>),
    /// Sample sent to the backend.
    SampleForwarded,
    /// Sample dropped because recording is off.
    SampleGated,
    /// Sample dropped because the backend is unreachable.
    SampleDropped,
    /// Non-JSON frame passed to the backend unchanged.
    RawForwarded,
    /// Well-formed frame of a type the relay does not handle.
    Ignored,
    /// Frame failed to decode and was discarded.
    Malformed,
}

/// Process-wide broker state.
pub struct Relay {
    link: Arc<UpstreamLink>,
    broadcaster: Broadcaster,
    /// Held across "set flag + broadcast" so flag order and broadcast order agree.
    recording: Mutex<bool>,
    options: RelayOptions,
}

impl Relay {
    /// Create a relay with recording off.
    pub fn new(link: Arc<UpstreamLink>, broadcaster: Broadcaster, options: RelayOptions) -> Self {
        Self {
            link,
            broadcaster,
            recording: Mutex::new(false),
            options,
        }
    }

    /// The upstream link.
    pub fn link(&self) -> &Arc<UpstreamLink> {
        &self.link
    }

    /// The client broadcaster.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Global recording flag.
    pub fn is_recording(&self) -> bool {
        *self.recording.lock()
    }

    /// Current upstream status.
    pub fn upstream_status(&self) -> UpstreamStatus {
        self.link.status()
    }

    /// Send the current status to a newly registered client after the
    /// configured delay.
    pub fn on_client_connected(self: &Arc<Self>, conn: Arc<ClientConnection>) {
        let delay = self.options.initial_status_delay;
        if delay.is_zero() {
            self.send_status(&conn);
            return;
        }
        let relay = Arc::clone(self);
        drop(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            relay.send_status(&conn);
        }));
    }

    /// Decode one browser frame and act on it.
    pub fn handle_client_frame(&self, conn: &ClientConnection, text: &str) -> Dispatch {
        let msg = match ClientMessage::decode(text) {
            Ok(msg) => msg,
            Err(e) => return self.handle_malformed(conn, text, &e),
        };
        counter!(FRAMES_RECEIVED_TOTAL, "kind" => msg.kind()).increment(1);

        match msg {
            ClientMessage::GetStatus => {
                self.send_status(conn);
                Dispatch::StatusSent
            }
            ClientMessage::Command { command } => {
                let parsed = command.as_deref().and_then(Command::parse);
                match parsed {
                    Some(cmd) => {
                        let _ = self.handle_command(cmd, conn);
                    }
                    None => debug!(
                        conn_id = %conn.id,
                        command = command.as_deref().unwrap_or("<none>"),
                        "ignoring unrecognized command"
                    ),
                }
                Dispatch::Command(parsed)
            }
            ClientMessage::MouseMove { x, y, t } => self.handle_sample(x, y, t),
            ClientMessage::Unknown => {
                debug!(conn_id = %conn.id, "ignoring frame of unknown type");
                Dispatch::Ignored
            }
        }
    }

    /// Apply a control command from `conn`.
    ///
    /// Returns whether the command was queued for the backend. Repeated
    /// start/stop commands are applied and broadcast every time.
    pub fn handle_command(&self, command: Command, conn: &ClientConnection) -> bool {
        counter!(COMMANDS_TOTAL, "command" => command.as_str()).increment(1);
        info!(conn_id = %conn.id, %command, "command received");

        match command {
            Command::StartRecording => {
                self.set_recording(true);
                self.forward_command(command)
            }
            Command::StopRecording => {
                self.set_recording(false);
                self.forward_command(command)
            }
            Command::GenerateHeatmap => {
                if self.link.is_connected() {
                    self.forward_command(command)
                } else {
                    warn!(conn_id = %conn.id, "heatmap requested with upstream down");
                    let _ = self
                        .broadcaster
                        .unicast(&RelayEvent::upstream_not_connected(), conn);
                    false
                }
            }
        }
    }

    fn set_recording(&self, value: bool) {
        let mut recording = self.recording.lock();
        *recording = value;
        gauge!(RECORDING).set(if value { 1.0 } else { 0.0 });
        let delivery = self
            .broadcaster
            .broadcast(&RelayEvent::RecordingStatus { recording: value });
        info!(
            recording = value,
            recipients = delivery.attempted,
            dropped = delivery.dropped(),
            "recording state changed"
        );
    }

    fn forward_command(&self, command: Command) -> bool {
        match UpstreamMessage::command(command).encode() {
            Ok(json) => {
                let sent = self.link.send(json);
                if !sent {
                    debug!(%command, "upstream unavailable, command not forwarded");
                }
                sent
            }
            Err(e) => {
                warn!(%command, error = %e, "failed to encode command");
                false
            }
        }
    }

    fn handle_sample(&self, x: Number, y: Number, t: Number) -> Dispatch {
        if !self.is_recording() {
            counter!(TELEMETRY_DROPPED_TOTAL, "reason" => "not_recording").increment(1);
            return Dispatch::SampleGated;
        }
        let json = match (TelemetrySample { x, y, t }).encode() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode sample");
                return Dispatch::SampleDropped;
            }
        };
        if self.link.send(json) {
            counter!(TELEMETRY_FORWARDED_TOTAL).increment(1);
            Dispatch::SampleForwarded
        } else {
            counter!(TELEMETRY_DROPPED_TOTAL, "reason" => "upstream_unavailable").increment(1);
            Dispatch::SampleDropped
        }
    }

    /// Only frames that are not JSON at all are eligible for raw passthrough;
    /// parseable JSON the relay cannot use is discarded.
    fn handle_malformed(
        &self,
        conn: &ClientConnection,
        text: &str,
        err: &ProtocolError,
    ) -> Dispatch {
        if self.options.forward_raw_frames
            && matches!(err, ProtocolError::NotJson(_))
            && self.is_recording()
            && self.link.send(text.to_owned())
        {
            debug!(conn_id = %conn.id, len = text.len(), "forwarded raw frame upstream");
            return Dispatch::RawForwarded;
        }
        counter!(MALFORMED_FRAMES_TOTAL, "source" => "client").increment(1);
        warn!(conn_id = %conn.id, error = %err, "discarding malformed client frame");
        Dispatch::Malformed
    }

    fn send_status(&self, conn: &ClientConnection) {
        if !self.link.send_status(conn) {
            debug!(conn_id = %conn.id, "status not delivered");
        }
    }
}
