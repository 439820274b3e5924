//! Polling loop and module lifecycle for face-tracking telemetry.
//!
//! This is the layer that wires everything together:
//! a [`TransportSource`](facetrack_transport::TransportSource) feeds a
//! [`PollLoop`] that decodes, normalizes and maps every frame, then hands the
//! result to an [`ExpressionSink`]. [`TrackingModule`] owns the poll thread.

pub mod config;
pub mod error;
pub mod module;
pub mod poll;
pub mod sink;

pub use config::{
    DatagramSettings, ModuleConfig, SharedMemorySettings, StreamSettings, TransportConfig,
    DEFAULT_RECONNECT_PAUSE,
};
pub use error::{PipelineError, Result};
pub use module::{Capabilities, TrackingModule, POLL_THREAD_NAME};
pub use poll::{LoopState, PollLoop, PollOutcome, PollStats};
pub use sink::{channel_sink, ExpressionSink, SharedExpressionFrame};
