//! Frame codec.
//!
//! Incremental assembly and emission of wire frames. The decoder accepts
//! bytes one at a time or in chunks — whatever the transport delivers —
//! and yields a frame only once the shape's full length has arrived:
//! exactly 6 bytes for a fixed frame, declared length + 6 for a variable
//! frame. Framing defects (bad start byte, checksum mismatch, wrong end
//! byte, length mismatch) consume the offending bytes and surface as
//! errors the link layer treats as "no frame received".

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Iec102Error;
use crate::types::{
    FixedFrame, Frame, VariableFrame, FIXED_FRAME_LEN, FIXED_START_BYTE, VARIABLE_FRAME_OVERHEAD,
    VARIABLE_START_BYTE,
};

/// Byte dial-up lines idle at between frames; discarded while waiting for
/// a start marker.
const IDLE_BYTE: u8 = 0xFF;

/// IEC 60870-5-102 frame codec.
///
/// Stateless between frames: all assembly state lives in the caller's
/// buffer, so a failed frame leaves the codec ready for the next start
/// byte.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Iec102Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Iec102Error> {
        // Discard idle noise ahead of a frame start.
        while src.first() == Some(&IDLE_BYTE) {
            src.advance(1);
        }

        let Some(&start) = src.first() else {
            return Ok(None);
        };

        match start {
            FIXED_START_BYTE => {
                if src.len() < FIXED_FRAME_LEN {
                    return Ok(None);
                }
                let raw = src.split_to(FIXED_FRAME_LEN);
                Ok(Some(Frame::Fixed(FixedFrame::parse(&raw)?)))
            }
            VARIABLE_START_BYTE => {
                if src.len() < 2 {
                    return Ok(None);
                }
                let total = usize::from(src[1]) + VARIABLE_FRAME_OVERHEAD;
                if src.len() < total {
                    return Ok(None);
                }
                let raw = src.split_to(total);
                Ok(Some(Frame::Variable(VariableFrame::parse(&raw)?)))
            }
            other => {
                // Consume the byte so a retrying reader makes progress.
                src.advance(1);
                Err(Iec102Error::BadStartByte(other))
            }
        }
    }
}

impl<'a> Encoder<&'a Frame> for FrameCodec {
    type Error = Iec102Error;

    fn encode(&mut self, item: &'a Frame, dst: &mut BytesMut) -> Result<(), Iec102Error> {
        dst.extend_from_slice(&item.to_bytes());
        Ok(())
    }
}

/// Stateful byte-at-a-time frame parser.
///
/// Thin wrapper over [`FrameCodec`] for transports that deliver single
/// bytes: `feed` buffers one byte and returns a frame once complete.
#[derive(Debug, Default)]
pub struct FrameParser {
    codec: FrameCodec,
    buf: BytesMut,
}

impl FrameParser {
    /// Create a new parser with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte; returns a frame when it completes one.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, Iec102Error> {
        self.buf.extend_from_slice(&[byte]);
        self.codec.decode(&mut self.buf)
    }

    /// Append a chunk; returns the first frame it completes, leaving any
    /// following bytes buffered.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Result<Option<Frame>, Iec102Error> {
        self.buf.extend_from_slice(bytes);
        self.codec.decode(&mut self.buf)
    }

    /// Drop any partially assembled frame.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Bytes currently buffered.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cause, CauseField, ControlField, FunctionCode, TypeId};
    use bytes::Bytes;

    const FIXED: [u8; 6] = [0x10, 0x49, 0x0c, 0x87, 0xdc, 0x16];
    const AUTH: [u8; 19] = [
        0x68, 0x0d, 0x0d, 0x68, 0x73, 0x0c, 0x87, 0xb7, 0x01, 0x06, 0x01, 0x00, 0x00, 0x08, 0x00,
        0x00, 0x00, 0xcd, 0x16,
    ];

    #[test]
    fn test_feed_fixed_frame_byte_by_byte() {
        let mut parser = FrameParser::new();
        for &b in &FIXED[..5] {
            assert!(parser.feed(b).unwrap().is_none());
        }
        let frame = parser.feed(FIXED[5]).unwrap().unwrap();
        let Frame::Fixed(fixed) = frame else {
            panic!("expected fixed frame");
        };
        assert_eq!(fixed.der, 34572);
        assert_eq!(fixed.control.function, 9);
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn test_feed_variable_frame_byte_by_byte() {
        let mut parser = FrameParser::new();
        for &b in &AUTH[..18] {
            assert!(parser.feed(b).unwrap().is_none());
        }
        let frame = parser.feed(AUTH[18]).unwrap().unwrap();
        let var = frame.into_variable().unwrap();
        assert_eq!(var.type_id, TypeId::Authenticate);
        assert_eq!(var.declared_length(), 13);
    }

    #[test]
    fn test_decode_chunked() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&AUTH[..7]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&AUTH[7..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(frame.as_variable().is_some());
    }

    #[test]
    fn test_decode_two_frames_back_to_back() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&FIXED);
        buf.extend_from_slice(&AUTH);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert!(first.is_fixed());
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert!(second.as_variable().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_skips_idle_noise() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF][..]);
        buf.extend_from_slice(&FIXED);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(frame.is_fixed());
    }

    #[test]
    fn test_decode_bad_start_byte() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x42][..]);
        buf.extend_from_slice(&FIXED);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, Iec102Error::BadStartByte(0x42)));
        // The bad byte is consumed; the next call finds the frame.
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(frame.is_fixed());
    }

    #[test]
    fn test_decode_checksum_mismatch_consumes_frame() {
        let mut codec = FrameCodec::new();
        let mut corrupted = AUTH;
        corrupted[14] = 0x99;
        let mut buf = BytesMut::from(&corrupted[..]);
        buf.extend_from_slice(&FIXED);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, Iec102Error::ChecksumMismatch { .. }));
        // The rejected frame's bytes are gone; the good frame follows.
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(frame.is_fixed());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let frame = Frame::Variable(VariableFrame {
            control: ControlField::primary(FunctionCode::UserData, true, true),
            der: 34572,
            type_id: TypeId::Authenticate,
            qualifier: 1,
            cause: CauseField::new(Cause::Activation),
            dir_pm: 1,
            register: 0,
            data: Bytes::from_static(&[0x08, 0x00, 0x00, 0x00]),
            payload: None,
        });

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(&frame, &mut buf).unwrap();
        assert_eq!(&buf[..], &AUTH[..]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        let var = decoded.into_variable().unwrap();
        assert_eq!(var.der, 34572);
        assert_eq!(var.cause.cause().unwrap(), Cause::Activation);
    }

    #[test]
    fn test_parser_reset() {
        let mut parser = FrameParser::new();
        parser.feed(0x10).unwrap();
        parser.feed(0x49).unwrap();
        assert_eq!(parser.pending(), 2);
        parser.reset();
        assert_eq!(parser.pending(), 0);

        for &b in &FIXED[..5] {
            parser.feed(b).unwrap();
        }
        assert!(parser.feed(FIXED[5]).unwrap().is_some());
    }
}
