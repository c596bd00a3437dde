//! Streaming packet decoder for byte-stream transports.

use crate::frame::{FrameHeader, HEADER_LEN};
use bytes::{Bytes, BytesMut};

/// Splits a byte stream into whole packets.
///
/// Packet boundaries come from the header's declared size, so a sender on a
/// stream transport must only use representable payload sizes. Each packet is
/// returned raw, header included, ready to be handed to the engine.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to take the next complete packet from the buffer.
    ///
    /// Returns `None` if more data is needed.
    pub fn decode_packet(&mut self) -> Option<Bytes> {
        if self.buffer.len() < HEADER_LEN {
            return None;
        }
        let header = FrameHeader::parse(&self.buffer).ok()?;
        if self.buffer.len() < header.packet_len() {
            return None;
        }
        Some(self.buffer.split_to(header.packet_len()).freeze())
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Command, Message};

    #[test]
    fn test_decode_single_packet() {
        let mut decoder = Decoder::new();
        decoder.extend(&[0x10, 0x01, 0x03]);

        let packet = decoder.decode_packet().unwrap();
        assert_eq!(packet.as_ref(), &[0x10, 0x01, 0x03]);
        assert_eq!(decoder.buffered(), 0);
        assert!(decoder.decode_packet().is_none());
    }

    #[test]
    fn test_partial_packet_decoding() {
        let encoded = Message::new(Command::WriteVar, vec![0x01, 0xAA, 0xBB]).encode();

        let mut decoder = Decoder::new();

        // Header only
        decoder.extend(&encoded[..2]);
        assert!(decoder.decode_packet().is_none());

        // Part of the payload
        decoder.extend(&encoded[2..4]);
        assert!(decoder.decode_packet().is_none());

        decoder.extend(&encoded[4..]);
        let packet = decoder.decode_packet().unwrap();
        let msg = Message::decode(&packet).unwrap();
        assert_eq!(msg.command(), Some(Command::WriteVar));
        assert_eq!(msg.payload.as_ref(), &[0x01, 0xAA, 0xBB]);
    }

    #[test]
    fn test_multiple_packets_in_buffer() {
        let mut decoder = Decoder::new();
        decoder.extend(&Message::empty(Command::QueryVarsList).encode());
        decoder.extend(&Message::new(Command::ReadVar, vec![0x02]).encode());

        let first = decoder.decode_packet().unwrap();
        assert_eq!(first.as_ref(), &[0x02, 0x00]);

        let second = decoder.decode_packet().unwrap();
        assert_eq!(second.as_ref(), &[0x10, 0x01, 0x02]);

        assert!(decoder.decode_packet().is_none());
    }

    #[test]
    fn test_large_packet() {
        let mut payload = vec![0x00, 0x03];
        payload.extend(std::iter::repeat(0x11).take(16384));
        let encoded = Message::new(Command::CurveBlock, payload).encode();

        let mut decoder = Decoder::new();
        for chunk in encoded.chunks(1000) {
            decoder.extend(chunk);
        }
        let packet = decoder.decode_packet().unwrap();
        assert_eq!(packet.len(), 2 + 2 + 16384);
    }

    #[test]
    fn test_decoder_buffered() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.buffered(), 0);

        decoder.extend(b"abc");
        assert_eq!(decoder.buffered(), 3);

        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_default() {
        let decoder = Decoder::default();
        assert_eq!(decoder.buffered(), 0);
    }
}
