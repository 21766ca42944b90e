//! Error types for the realtime dialog client.

use thiserror::Error;

/// Result type alias for dialog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Frame decoding failures, one variant per truncation point plus the
/// unknown-bits and trailing-bytes cases.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecErrorKind {
    #[error("frame shorter than the fixed header")]
    MissingHeader,
    #[error("unknown message type bits")]
    UnknownMessageType,
    #[error("unknown serialization bits")]
    UnknownSerialization,
    #[error("unknown compression bits")]
    UnknownCompression,
    #[error("truncated sequence field")]
    ShortSequence,
    #[error("truncated error code field")]
    ShortErrorCode,
    #[error("truncated event field")]
    ShortEvent,
    #[error("truncated session id length")]
    ShortSessionIdLen,
    #[error("truncated session id body")]
    ShortSessionIdBody,
    #[error("truncated connect id length")]
    ShortConnectIdLen,
    #[error("truncated connect id body")]
    ShortConnectIdBody,
    #[error("truncated payload length")]
    ShortPayloadLen,
    #[error("truncated payload body")]
    ShortPayloadBody,
    #[error("trailing bytes after a complete frame")]
    TrailingBytes,
    #[error("gzip compression failed")]
    Compress,
    #[error("gzip decompression failed")]
    Decompress,
}

/// Frame decoding/encoding errors, carrying the offending byte counts where
/// that is informative.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame is {0} bytes, shorter than the fixed header")]
    MissingHeader(usize),
    #[error("unknown message type bits: {0:#06b}")]
    UnknownMessageType(u8),
    #[error("unknown serialization bits: {0:#06b}")]
    UnknownSerialization(u8),
    #[error("unknown compression bits: {0:#06b}")]
    UnknownCompression(u8),
    #[error("truncated sequence field")]
    ShortSequence,
    #[error("truncated error code field")]
    ShortErrorCode,
    #[error("truncated event field")]
    ShortEvent,
    #[error("truncated session id length")]
    ShortSessionIdLen,
    #[error("truncated session id body: expected {expected} bytes, found {found}")]
    ShortSessionIdBody { expected: usize, found: usize },
    #[error("truncated connect id length")]
    ShortConnectIdLen,
    #[error("truncated connect id body: expected {expected} bytes, found {found}")]
    ShortConnectIdBody { expected: usize, found: usize },
    #[error("truncated payload length")]
    ShortPayloadLen,
    #[error("truncated payload body: expected {expected} bytes, found {found}")]
    ShortPayloadBody { expected: usize, found: usize },
    #[error("{0} trailing byte(s) after a complete frame")]
    TrailingBytes(usize),
    #[error("gzip compression failed: {0}")]
    Compress(String),
    #[error("gzip decompression failed: {0}")]
    Decompress(String),
}

impl CodecError {
    /// The error-kind this variant belongs to, ignoring the carried data.
    /// Useful for tests that assert "the decoder failed at this cut point"
    /// without pinning exact byte counts.
    pub fn kind(&self) -> CodecErrorKind {
        match self {
            CodecError::MissingHeader(_) => CodecErrorKind::MissingHeader,
            CodecError::UnknownMessageType(_) => CodecErrorKind::UnknownMessageType,
            CodecError::UnknownSerialization(_) => CodecErrorKind::UnknownSerialization,
            CodecError::UnknownCompression(_) => CodecErrorKind::UnknownCompression,
            CodecError::ShortSequence => CodecErrorKind::ShortSequence,
            CodecError::ShortErrorCode => CodecErrorKind::ShortErrorCode,
            CodecError::ShortEvent => CodecErrorKind::ShortEvent,
            CodecError::ShortSessionIdLen => CodecErrorKind::ShortSessionIdLen,
            CodecError::ShortSessionIdBody { .. } => CodecErrorKind::ShortSessionIdBody,
            CodecError::ShortConnectIdLen => CodecErrorKind::ShortConnectIdLen,
            CodecError::ShortConnectIdBody { .. } => CodecErrorKind::ShortConnectIdBody,
            CodecError::ShortPayloadLen => CodecErrorKind::ShortPayloadLen,
            CodecError::ShortPayloadBody { .. } => CodecErrorKind::ShortPayloadBody,
            CodecError::TrailingBytes(_) => CodecErrorKind::TrailingBytes,
            CodecError::Compress(_) => CodecErrorKind::Compress,
            CodecError::Decompress(_) => CodecErrorKind::Decompress,
        }
    }
}

/// Top-level error type, following the taxonomy of codec / transport /
/// protocol / device / server-signalled errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or truncated frame.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport (WebSocket) fault: peer close, network error, write failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Local I/O fault (diagnostic file, audio device plumbing).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON payload in a handshake or event message.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected type or event where the handshake or steady-state dispatch
    /// expected something else.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Audio device open/read/write failure.
    #[error("device error: {0}")]
    Device(String),

    /// A frame with `type=Error` received from the server.
    #[error("server error {code}: {message}")]
    Server { code: u32, message: String },

    /// Invalid configuration (missing credential, bad URL, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A spawned worker task failed or panicked.
    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    pub fn device(message: impl Into<String>) -> Self {
        Error::Device(message.into())
    }

    pub fn server(code: u32, message: impl Into<String>) -> Self {
        Error::Server {
            code,
            message: message.into(),
        }
    }

    /// Whether this error should terminate the session (vs. being
    /// recoverable). Per the error-handling design, every variant here is
    /// terminal for the worker that observed it; there is no retry policy.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_kind_matches_variant() {
        assert_eq!(
            CodecError::ShortSessionIdBody {
                expected: 4,
                found: 1
            }
            .kind(),
            CodecErrorKind::ShortSessionIdBody
        );
        assert_eq!(CodecError::TrailingBytes(3).kind(), CodecErrorKind::TrailingBytes);
        assert_eq!(
            CodecError::Compress("boom".to_string()).kind(),
            CodecErrorKind::Compress
        );
        assert_eq!(
            CodecError::Decompress("boom".to_string()).kind(),
            CodecErrorKind::Decompress
        );
    }

    #[test]
    fn display_messages_are_non_empty() {
        let err = Error::protocol("unexpected event 999 during handshake");
        assert!(!err.to_string().is_empty());
    }
}
