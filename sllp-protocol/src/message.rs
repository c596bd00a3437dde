//! Command codes and the owned message type.

use crate::error::{ErrorCode, ProtocolError};
use crate::frame::{encode_size, FrameHeader, HEADER_LEN};
use bytes::{BufMut, Bytes, BytesMut};

/// SLLP command codes.
///
/// Requests and their answers share one code space; error answers live in
/// `0xE1..=0xE8` and are described by [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Queries
    QueryStatus = 0x00,
    Status = 0x01,
    QueryVarsList = 0x02,
    VarsList = 0x03,
    QueryGroupsList = 0x04,
    GroupsList = 0x05,
    QueryGroup = 0x06,
    Group = 0x07,
    QueryCurvesList = 0x08,
    CurvesList = 0x09,

    // Reads
    ReadVar = 0x10,
    VarReading = 0x11,
    ReadGroup = 0x12,
    GroupReading = 0x13,

    // Writes
    WriteVar = 0x20,
    WriteGroup = 0x22,

    // Group management
    CreateGroup = 0x30,
    GroupCreated = 0x31,
    RemoveAllGroups = 0x32,

    // Curve transfer
    CurveTransmit = 0x40,
    CurveBlock = 0x41,
    CurveRecalcCsum = 0x42,

    // Generic answer
    Ok = 0xE0,
}

impl Command {
    /// Returns the wire value of this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parses a wire value, returning `None` for unknown codes and error
    /// codes.
    pub fn from_code(code: u8) -> Option<Self> {
        let command = match code {
            0x00 => Command::QueryStatus,
            0x01 => Command::Status,
            0x02 => Command::QueryVarsList,
            0x03 => Command::VarsList,
            0x04 => Command::QueryGroupsList,
            0x05 => Command::GroupsList,
            0x06 => Command::QueryGroup,
            0x07 => Command::Group,
            0x08 => Command::QueryCurvesList,
            0x09 => Command::CurvesList,
            0x10 => Command::ReadVar,
            0x11 => Command::VarReading,
            0x12 => Command::ReadGroup,
            0x13 => Command::GroupReading,
            0x20 => Command::WriteVar,
            0x22 => Command::WriteGroup,
            0x30 => Command::CreateGroup,
            0x31 => Command::GroupCreated,
            0x32 => Command::RemoveAllGroups,
            0x40 => Command::CurveTransmit,
            0x41 => Command::CurveBlock,
            0x42 => Command::CurveRecalcCsum,
            0xE0 => Command::Ok,
            _ => return None,
        };
        Some(command)
    }
}

/// A decoded SLLP message.
///
/// The payload is owned, so a response can be built while the request that
/// produced it is still borrowed from a transport buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw command code. Kept raw so that unknown codes survive decoding.
    pub code: u8,
    /// Message payload.
    pub payload: Bytes,
}

impl Message {
    /// Creates a message for a known command.
    pub fn new(command: Command, payload: impl Into<Bytes>) -> Self {
        Self {
            code: command.code(),
            payload: payload.into(),
        }
    }

    /// Creates a message with an empty payload.
    pub fn empty(command: Command) -> Self {
        Self::new(command, Bytes::new())
    }

    /// Creates the generic OK answer.
    pub fn ok() -> Self {
        Self::empty(Command::Ok)
    }

    /// Creates an error answer.
    pub fn error(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            payload: Bytes::new(),
        }
    }

    /// Returns the command, if the code is a known one.
    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.code)
    }

    /// Returns the error code, if this is an error answer.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }

    /// Returns whether this is an error answer.
    pub fn is_error(&self) -> bool {
        self.error_code().is_some()
    }

    /// Decodes a whole packet.
    ///
    /// The packet length must match the header's declared payload size
    /// exactly.
    pub fn decode(packet: &[u8]) -> Result<Self, ProtocolError> {
        let header = FrameHeader::parse(packet)?;
        let actual = packet.len() - HEADER_LEN;
        if actual != header.payload_len {
            return Err(ProtocolError::LengthMismatch {
                declared: header.payload_len,
                actual,
            });
        }
        Ok(Self {
            code: header.code,
            payload: Bytes::copy_from_slice(&packet[HEADER_LEN..]),
        })
    }

    /// Encodes the message into a packet.
    ///
    /// The size byte is derived from the payload length; the packet always
    /// carries the full payload.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.code);
        buf.put_u8(encode_size(self.payload.len()));
        buf.put_slice(&self.payload);
        buf
    }
}
