/// Errors that can occur while handling raw frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The buffer is not exactly one frame long.
    #[error("malformed frame ({len} bytes, expected {expected})")]
    MalformedFrame { len: usize, expected: usize },

    /// A channel name did not match any entry of the channel table.
    #[error("unknown channel name: {0}")]
    UnknownChannel(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
