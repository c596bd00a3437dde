//! # sllp-protocol
//!
//! Wire protocol implementation for SLLP (Sirius Low Level Protocol).
//!
//! This crate provides:
//! - The two-byte packet header and its non-standard size encoding
//! - Command codes and wire error codes
//! - Owned request/response message types
//! - A streaming packet decoder for byte-stream transports

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::Decoder;
pub use error::{ErrorCode, ProtocolError};
pub use frame::{decode_size, encode_size, HEADER_LEN};
pub use message::{Command, Message};

/// Maximum payload size representable by the size encoding (one curve
/// block plus curve id and block index).
pub const MAX_PAYLOAD_SIZE: usize = 16386;

/// Maximum size of a whole packet, header included.
pub const MAX_PACKET_SIZE: usize = MAX_PAYLOAD_SIZE + HEADER_LEN;
