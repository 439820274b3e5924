use std::net::SocketAddr;

use facetrack_frame::FrameError;

/// Errors that can occur while acquiring frames.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The frame source does not exist yet (mapping missing, peer not listening).
    #[error("{target} unavailable: {source}")]
    Unavailable {
        target: String,
        source: std::io::Error,
    },

    /// Every connection attempt allowed by the retry budget failed.
    #[error("{target} still unavailable after {attempts} attempts")]
    AttemptsExhausted { target: String, attempts: u32 },

    /// Failed to bind a local socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The peer closed the stream before a full frame arrived.
    #[error("connection lost after {received} bytes of a frame")]
    ConnectionLost { received: usize },

    /// A frame of the wrong size was received.
    #[error("malformed frame: {0}")]
    Malformed(#[from] FrameError),

    /// The shared memory segment exists but cannot hold a frame yet.
    #[error("mapping {name} too small ({len} bytes, need {required})")]
    MappingTooSmall {
        name: String,
        len: usize,
        required: usize,
    },

    /// `read_frame` was called on a source that has no live connection.
    #[error("transport not connected")]
    NotConnected,

    /// No data arrived within the configured read timeout.
    #[error("read timed out")]
    TimedOut,

    /// An I/O error occurred on the underlying handle.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Whether connecting again later may succeed.
    ///
    /// Covers a companion that has not finished starting (missing or still
    /// unsized segment, peer not listening) and a stream that dropped.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Unavailable { .. }
                | TransportError::MappingTooSmall { .. }
                | TransportError::ConnectionLost { .. }
                | TransportError::NotConnected
                | TransportError::TimedOut
        )
    }

    /// Whether the error concerns a single bad frame rather than the transport.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TransportError::Malformed(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
