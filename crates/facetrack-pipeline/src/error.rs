use std::path::PathBuf;

/// Errors that can occur while configuring or running a tracking module.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] facetrack_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] facetrack_frame::FrameError),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A companion executable was configured but does not exist.
    #[error("companion executable not found at {}", .0.display())]
    CompanionMissing(PathBuf),

    /// `start` was called on a module whose poll loop already runs.
    #[error("poll loop already started")]
    AlreadyStarted,

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (config file, thread spawn).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The poll thread panicked or could not be joined.
    #[error("poll thread failed: {0}")]
    Thread(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
