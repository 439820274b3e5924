//! Fixed-layout face-tracking frame codec.
//!
//! The companion process emits one frame per sample:
//! - 63 channels, each a little-endian IEEE-754 `f32`
//! - 252 bytes total, no header, no length prefix
//! - channel order fixed by [`Channel`]
//!
//! This is the lowest layer of facetrack. Transports hand out [`RawFrame`]s,
//! and everything above works on decoded [`ChannelValues`].

pub mod channel;
pub mod codec;
pub mod error;

pub use channel::{Channel, CHANNEL_COUNT};
pub use codec::{decode_bytes, decode_frame, encode_frame, ChannelValues, RawFrame, FRAME_SIZE};
pub use error::{FrameError, Result};
