use std::ops::{Index, IndexMut};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::channel::{Channel, CHANNEL_COUNT};
use crate::error::{FrameError, Result};

/// Size of one frame on the wire: 63 channels × 4 bytes.
pub const FRAME_SIZE: usize = CHANNEL_COUNT * 4;

/// One complete, undecoded frame.
///
/// A `RawFrame` can only be built from exactly [`FRAME_SIZE`] bytes, so a
/// partially received frame is never observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Bytes,
}

impl RawFrame {
    /// Wrap a complete frame buffer.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() != FRAME_SIZE {
            return Err(FrameError::MalformedFrame {
                len: bytes.len(),
                expected: FRAME_SIZE,
            });
        }
        Ok(Self { bytes })
    }

    /// The frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }
}

/// The 63 channel values of one frame, addressed by [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelValues {
    values: [f32; CHANNEL_COUNT],
}

impl ChannelValues {
    /// All channels set to zero.
    pub fn zeroed() -> Self {
        Self {
            values: [0.0; CHANNEL_COUNT],
        }
    }

    /// Build from values already in wire order.
    pub fn from_array(values: [f32; CHANNEL_COUNT]) -> Self {
        Self { values }
    }

    /// Value of a channel.
    pub fn get(&self, channel: Channel) -> f32 {
        self.values[channel.index()]
    }

    /// Overwrite a channel.
    pub fn set(&mut self, channel: Channel, value: f32) {
        self.values[channel.index()] = value;
    }

    /// Values in wire order.
    pub fn as_array(&self) -> &[f32; CHANNEL_COUNT] {
        &self.values
    }

    /// `(channel, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::ALL.iter().copied().zip(self.values.iter().copied())
    }

    /// Encode into a standalone raw frame.
    pub fn to_raw(&self) -> RawFrame {
        let mut buf = BytesMut::with_capacity(FRAME_SIZE);
        encode_frame(self, &mut buf);
        RawFrame {
            bytes: buf.freeze(),
        }
    }
}

impl Default for ChannelValues {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Index<Channel> for ChannelValues {
    type Output = f32;

    fn index(&self, channel: Channel) -> &f32 {
        &self.values[channel.index()]
    }
}

impl IndexMut<Channel> for ChannelValues {
    fn index_mut(&mut self, channel: Channel) -> &mut f32 {
        &mut self.values[channel.index()]
    }
}

/// Decode a raw frame into channel values.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬─────┬─────────────┐
/// │ ch 0 (4B)  │ ch 1 (4B)  │ ... │ ch 62 (4B)  │
/// │ f32 LE     │ f32 LE     │     │ f32 LE      │
/// └────────────┴────────────┴─────┴─────────────┘
/// ```
pub fn decode_frame(raw: &RawFrame) -> Result<ChannelValues> {
    decode_bytes(raw.as_bytes())
}

/// Decode a byte slice that must hold exactly one frame.
pub fn decode_bytes(mut src: &[u8]) -> Result<ChannelValues> {
    if src.len() != FRAME_SIZE {
        return Err(FrameError::MalformedFrame {
            len: src.len(),
            expected: FRAME_SIZE,
        });
    }

    let mut values = [0.0f32; CHANNEL_COUNT];
    for value in values.iter_mut() {
        *value = src.get_f32_le();
    }
    Ok(ChannelValues { values })
}

/// Encode channel values in wire order.
pub fn encode_frame(values: &ChannelValues, dst: &mut BytesMut) {
    dst.reserve(FRAME_SIZE);
    for value in values.values {
        dst.put_f32_le(value);
    }
}
