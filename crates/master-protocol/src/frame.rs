//! Frame codec: `[signature:1=0x55][sequence:1][bodyLen:2 LE][packetId:1][body]`.
//!
//! Modeled on `valence_protocol`'s `PacketDecoder`/`PacketEncoder`: a
//! stateful decoder that accumulates partial reads over a growable buffer,
//! and an encoder that appends into a buffer and patches the length/sequence
//! fields in once the packet body is known. The difference from the teacher
//! is the header shape: a fixed 4-byte header instead of a leading VarInt.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::CodecError;

pub const SIGNATURE: u8 = 0x55;
const HEADER_LEN: usize = 4;

/// A decoded frame: the packet id and its body (the bytes after the id,
/// i.e. `bodyLen - 1` bytes).
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u8,
    pub packet_id: u8,
    pub body: Bytes,
}

/// Accumulates inbound bytes and yields complete frames as they arrive.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly-read bytes to the internal buffer.
    pub fn queue_bytes(&mut self, bytes: BytesMut) {
        self.buf.unsplit(bytes);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    pub fn take_capacity(&mut self) -> BytesMut {
        self.buf.split_off(self.buf.len())
    }

    /// Pulls one frame out of the buffer if enough bytes have arrived.
    /// `Ok(None)` means "keep reading"; any `Err` is fatal to the connection.
    pub fn try_next_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let signature = self.buf[0];
        if signature != SIGNATURE {
            return Err(CodecError::BadSignature(signature));
        }

        let sequence = self.buf[1];
        let body_len = u16::from_le_bytes([self.buf[2], self.buf[3]]) as usize;

        if body_len == 0 {
            return Err(CodecError::BadLength {
                declared: body_len,
                available: self.buf.len() - HEADER_LEN,
            });
        }

        let total_len = HEADER_LEN + body_len;

        if self.buf.len() < total_len {
            // Partial frame; wait for more bytes.
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        let mut frame_bytes = self.buf.split_to(body_len);

        let packet_id = frame_bytes[0];
        frame_bytes.advance(1);

        Ok(Some(Frame {
            sequence,
            packet_id,
            body: frame_bytes.freeze(),
        }))
    }
}

/// Builds one outbound frame at a time.
///
/// `begin_packet` records where this packet's body starts; typed writers
/// push bytes onto the shared buffer; `finish_packet` patches the sequence
/// byte and the 2-byte length back in and returns the finished buffer,
/// mirroring the teacher's "write into the buffer, then patch the length
/// prefix at the front" strategy in `PacketEncoder::enframe_from`.
#[derive(Default)]
pub struct FrameEncoder {
    buf: Vec<u8>,
    packet_start: usize,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_packet(&mut self, packet_id: u8) {
        self.buf.clear();
        self.buf.extend_from_slice(&[SIGNATURE, 0, 0, 0]);
        self.packet_start = self.buf.len();
        self.buf.push(packet_id);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Patches in the sequence byte and body length, returning the
    /// finished frame ready to write to the socket.
    pub fn finish_packet(&mut self, sequence: u8) -> Result<Bytes, CodecError> {
        let body_len = self.buf.len() - self.packet_start;
        if body_len > u16::MAX as usize {
            return Err(CodecError::BadLength {
                declared: body_len,
                available: u16::MAX as usize,
            });
        }

        self.buf[1] = sequence;
        self.buf[2..4].copy_from_slice(&(body_len as u16).to_le_bytes());

        Ok(Bytes::from(std::mem::take(&mut self.buf)))
    }
}

/// Per-direction sequence state: a wrapping `u8` stamped on the wire, plus
/// an unbounded counter used only for packet-dump filenames (spec.md §4.1).
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceCounter {
    wire: u8,
    real: u64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sequence byte to stamp on the next frame, then advances.
    pub fn next(&mut self) -> u8 {
        let seq = self.wire;
        self.wire = self.wire.wrapping_add(1);
        self.real += 1;
        seq
    }

    /// The unbounded count of frames sent/received so far, for dump filenames.
    pub fn real(&self) -> u64 {
        self.real
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_frame() {
        let mut dec = FrameDecoder::new();
        let mut enc = FrameEncoder::new();
        enc.begin_packet(7);
        enc.append_bytes(b"hello");
        let frame_bytes = enc.finish_packet(3).unwrap();

        dec.queue_bytes(BytesMut::from(&frame_bytes[..]));
        let frame = dec.try_next_frame().unwrap().unwrap();
        assert_eq!(frame.sequence, 3);
        assert_eq!(frame.packet_id, 7);
        assert_eq!(&frame.body[..], b"hello");
        assert!(dec.try_next_frame().unwrap().is_none());
    }

    #[test]
    fn buffers_partial_reads() {
        let mut dec = FrameDecoder::new();
        let mut enc = FrameEncoder::new();
        enc.begin_packet(1);
        enc.append_bytes(b"0123456789");
        let frame_bytes = enc.finish_packet(0).unwrap();

        let (first, second) = frame_bytes.split_at(5);
        dec.queue_bytes(BytesMut::from(first));
        assert!(dec.try_next_frame().unwrap().is_none());

        dec.queue_bytes(BytesMut::from(second));
        let frame = dec.try_next_frame().unwrap().unwrap();
        assert_eq!(&frame.body[..], b"0123456789");
    }

    #[test]
    fn rejects_bad_signature() {
        let mut dec = FrameDecoder::new();
        dec.queue_bytes(BytesMut::from(&[0xAAu8, 0, 1, 0][..]));
        assert!(matches!(
            dec.try_next_frame(),
            Err(CodecError::BadSignature(0xAA))
        ));
    }

    #[test]
    fn sequence_wraps_modulo_256() {
        let mut seq = SequenceCounter::new();
        for expected in 0..=255u8 {
            assert_eq!(seq.next(), expected);
        }
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.real(), 257);
    }
}
