//! Frame sources for face-tracking telemetry.
//!
//! Provides one interface over the three ways the companion delivers frames:
//! - Shared memory mapping (a named segment rewritten in place)
//! - Stream connection (TCP, raw back-to-back frames)
//! - Datagrams (UDP, one frame per packet)
//!
//! Every backend implements [`TransportSource`] and owns its own
//! reconnection policy.

pub mod datagram;
pub mod error;
pub mod shm;
pub mod stream;
pub mod traits;

pub use datagram::{DatagramConfig, DatagramSource};
pub use error::{Result, TransportError};
pub use shm::{default_root, SharedMemoryConfig, SharedMemorySource, SharedMemoryWriter};
pub use stream::{StreamConfig, StreamSource};
pub use traits::{CloseHandle, TransportSource, TransportState};

/// Port the companion uses when none is configured.
pub const DEFAULT_PORT: u16 = 13191;
