//! Envelope decode errors.

use thiserror::Error;

/// Errors produced while decoding or encoding an envelope.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame text did not parse as JSON at all.
    #[error("frame is not JSON: {0}")]
    NotJson(serde_json::Error),
    /// The frame parsed, but a field of a known type had the wrong shape.
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame was valid JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// The object carried no string `type` discriminator.
    #[error("frame has no `type` field")]
    MissingType,
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
