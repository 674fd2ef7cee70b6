//! Opening a transport to the backend.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use crate::errors::LinkError;

/// Outbound half of a backend transport: one text frame per item.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = LinkError> + Send>>;

/// Inbound half of a backend transport. Ends on a clean close.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, LinkError>> + Send>>;

/// A live connection to the backend, reduced to text frames.
pub struct UpstreamTransport {
    /// Frames to the backend.
    pub sink: FrameSink,
    /// Frames from the backend.
    pub stream: FrameStream,
}

/// Opens backend transports. [`WsConnector`] is the production implementation.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempt one connection.
    async fn connect(&self) -> Result<UpstreamTransport, LinkError>;

    /// Where this connector points, for logs.
    fn endpoint(&self) -> &str;
}

/// Connects to the backend over `WebSocket`.
#[derive(Clone, Debug)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Create a connector for `url` (`ws://` or `wss://`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<UpstreamTransport, LinkError> {
        let (ws, _response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|source| LinkError::Connect {
                    url: self.url.clone(),
                    source,
                })?;
        debug!(url = %self.url, "upstream handshake complete");

        let (ws_tx, ws_rx) = ws.split();
        let sink = ws_tx
            .sink_map_err(LinkError::from)
            .with(|text: String| future::ready(Ok::<_, LinkError>(Message::Text(text.into()))));
        let stream = ws_rx.filter_map(|msg| future::ready(text_frame(msg)));

        Ok(UpstreamTransport {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Reduce a tungstenite message to a text frame, if it carries one.
fn text_frame(msg: Result<Message, tungstenite::Error>) -> Option<Result<String, LinkError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Some(Ok(text)),
            Err(_) => {
                warn!(len = data.len(), "discarding non-UTF8 binary frame from upstream");
                None
            }
        },
        // Control frames are answered by tungstenite; the stream ends after Close.
        Ok(Message::Close(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(tungstenite::Error::ConnectionClosed) => None,
        Err(e) => Some(Err(LinkError::Transport(e))),
    }
}
