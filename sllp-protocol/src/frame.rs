//! Packet header and payload size encoding.
//!
//! Packet layout (2 bytes header + payload):
//!
//! ```text
//! +--------------+--------------+---------------------------+
//! | command code | encoded size | payload                   |
//! |    1 byte    |    1 byte    | decode_size(size) bytes   |
//! +--------------+--------------+---------------------------+
//! ```
//!
//! The size byte uses two ranges. Values below 128 are stored literally.
//! Larger payloads set the top bit and store the number of 128-byte steps
//! above 130, rounded up, so the representable sizes are
//! `{0..=127} ∪ {130, 258, ..., 16386}`. Sizes 128 and 129 have no encoding.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;

/// Size of the packet header in bytes.
pub const HEADER_LEN: usize = 2;

/// Top bit of the size byte, marking the large range.
const LARGE_FLAG: u8 = 0x80;

/// Smallest size of the large range.
const LARGE_BASE: usize = 130;

/// Granularity of the large range.
const LARGE_STEP: usize = 128;

/// Decodes a size byte into a payload length.
pub fn decode_size(encoded: u8) -> usize {
    if encoded < LARGE_FLAG {
        return encoded as usize;
    }
    let steps = (encoded & !LARGE_FLAG) as usize;
    LARGE_STEP * steps + LARGE_BASE
}

/// Encodes a payload length into a size byte.
///
/// Lengths without an exact encoding round up to the next representable
/// size; 128 and 129 land on 130. Lengths above [`MAX_PAYLOAD_SIZE`]
/// saturate.
pub fn encode_size(size: usize) -> u8 {
    if size < LARGE_FLAG as usize {
        return size as u8;
    }
    if size <= LARGE_BASE {
        return LARGE_FLAG;
    }
    debug_assert!(size <= MAX_PAYLOAD_SIZE, "payload of {size} bytes");
    let steps = (size - LARGE_BASE).div_ceil(LARGE_STEP).min(0x7F);
    LARGE_FLAG | steps as u8
}

/// Returns whether `size` survives an encode/decode round trip.
pub fn is_representable(size: usize) -> bool {
    size <= MAX_PAYLOAD_SIZE && decode_size(encode_size(size)) == size
}

/// A parsed packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw command code.
    pub code: u8,
    /// Payload length declared by the size byte.
    pub payload_len: usize,
}

impl FrameHeader {
    /// Parses the header at the start of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        match buf {
            [code, size, ..] => Ok(Self {
                code: *code,
                payload_len: decode_size(*size),
            }),
            _ => Err(ProtocolError::PacketTooShort {
                len: buf.len(),
                min: HEADER_LEN,
            }),
        }
    }

    /// Total packet length implied by this header.
    pub fn packet_len(&self) -> usize {
        HEADER_LEN + self.payload_len
    }
}
