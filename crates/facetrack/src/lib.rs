//! Face-tracking telemetry ingestion.
//!
//! facetrack reads the fixed 63-channel frames a headset companion process
//! emits over shared memory, TCP or UDP, corrects the eyelid channels and
//! maps everything into a unified eye/lip expression schema.
//!
//! # Crate Structure
//!
//! - [`frame`]: Channel table and the 252-byte frame codec
//! - [`transport`]: Frame sources (shared memory, stream, datagram)
//! - [`expression`]: Normalization and unified-schema mapping
//! - [`pipeline`]: Poll loop, sinks and module lifecycle (behind `pipeline` feature)

/// Re-export frame types.
pub mod frame {
    pub use facetrack_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use facetrack_transport::*;
}

/// Re-export expression types.
pub mod expression {
    pub use facetrack_expression::*;
}

/// Re-export pipeline types (requires `pipeline` feature).
#[cfg(feature = "pipeline")]
pub mod pipeline {
    pub use facetrack_pipeline::*;
}
