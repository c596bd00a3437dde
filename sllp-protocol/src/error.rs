//! Protocol error types and wire error codes.

use std::fmt;
use thiserror::Error;

/// Errors raised while decoding a raw packet.
///
/// These never travel on the wire themselves: the engine answers any of them
/// with [`ErrorCode::MalformedMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("packet too short: {len} bytes (header is {min})")]
    PacketTooShort { len: usize, min: usize },

    #[error("payload length mismatch: header declares {declared} bytes, packet carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

/// Stable error codes carried as the command byte of an error response.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    MalformedMessage = 0xE1,
    OpNotSupported = 0xE2,
    InvalidId = 0xE3,
    InvalidValue = 0xE4,
    InvalidPayloadSize = 0xE5,
    ReadOnly = 0xE6,
    InsufficientMemory = 0xE7,
    Internal = 0xE8,
}

impl ErrorCode {
    /// Returns the wire value of this code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parses a wire value, returning `None` for anything that is not an
    /// error code.
    pub fn from_code(code: u8) -> Option<Self> {
        let err = match code {
            0xE1 => ErrorCode::MalformedMessage,
            0xE2 => ErrorCode::OpNotSupported,
            0xE3 => ErrorCode::InvalidId,
            0xE4 => ErrorCode::InvalidValue,
            0xE5 => ErrorCode::InvalidPayloadSize,
            0xE6 => ErrorCode::ReadOnly,
            0xE7 => ErrorCode::InsufficientMemory,
            0xE8 => ErrorCode::Internal,
            _ => return None,
        };
        Some(err)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::MalformedMessage => write!(f, "MALFORMED_MESSAGE"),
            ErrorCode::OpNotSupported => write!(f, "OP_NOT_SUPPORTED"),
            ErrorCode::InvalidId => write!(f, "INVALID_ID"),
            ErrorCode::InvalidValue => write!(f, "INVALID_VALUE"),
            ErrorCode::InvalidPayloadSize => write!(f, "INVALID_PAYLOAD_SIZE"),
            ErrorCode::ReadOnly => write!(f, "READ_ONLY"),
            ErrorCode::InsufficientMemory => write!(f, "INSUFFICIENT_MEMORY"),
            ErrorCode::Internal => write!(f, "INTERNAL"),
        }
    }
}
