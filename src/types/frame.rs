//! Link-layer frame model.
//!
//! The wire carries two frame shapes: a fixed 6-byte control frame and a
//! variable-length data frame wrapping one ASDU.
//!
//! ```text
//! Fixed:    +------+------+--------+--------+------+------+
//!           | 0x10 | C    | DER lo | DER hi | CS   | 0x16 |
//!           +------+------+--------+--------+------+------+
//!
//! Variable: +------+----+----+------+---//---+------+------+
//!           | 0x68 | L  | L  | 0x68 | ASDU   | CS   | 0x16 |
//!           +------+----+----+------+---//---+------+------+
//! ```
//!
//! The ASDU block is exactly `L` bytes: control byte, 2-byte station
//! address, type identifier, variable-structure qualifier, cause byte,
//! 2-byte measurement-point address, register address, then the message
//! data. Checksums are additive mod 256 over the control byte through the
//! end of the data.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Iec102Error, Result};
use crate::messages::Message;
use crate::registry;
use crate::types::{CauseField, TypeId};

/// Start byte of a fixed frame.
pub const FIXED_START_BYTE: u8 = 0x10;

/// Start byte of a variable frame.
pub const VARIABLE_START_BYTE: u8 = 0x68;

/// End byte of both frame shapes.
pub const END_BYTE: u8 = 0x16;

/// Total size of a fixed frame.
pub const FIXED_FRAME_LEN: usize = 6;

/// Envelope bytes inside the declared length of a variable frame: control,
/// station address, type, qualifier, cause, measurement-point address,
/// register address.
pub const ASDU_ENVELOPE_LEN: usize = 9;

/// Bytes of a variable frame outside the declared length: both start
/// markers, both length bytes, checksum, end byte.
pub const VARIABLE_FRAME_OVERHEAD: usize = 6;

/// Additive mod-256 checksum over a byte range.
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Link function codes sent by the master (primary station).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    /// Reset of remote link (0)
    ResetRemoteLink = 0,
    /// Send user data, confirmation expected (3)
    UserData = 3,
    /// Request link status (9)
    LinkStatusRequest = 9,
    /// Request class-2 user data (11)
    RequestClass2Data = 11,
}

impl FunctionCode {
    /// Convert to the raw 4-bit code.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The link control byte.
///
/// Packs, most-significant bit first: RES(1) PRM(1) FCB(1) FCV(1) FUNC(4).
/// Received frames keep the raw function code — a secondary station replies
/// with its own code space, and the link layer only needs the byte to
/// checksum and log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlField {
    /// Reserved bit
    pub res: bool,
    /// Primary-message bit: set on master-to-meter frames
    pub prm: bool,
    /// Frame-count bit, alternating per request
    pub fcb: bool,
    /// Frame-count-valid bit
    pub fcv: bool,
    /// 4-bit function code
    pub function: u8,
}

impl ControlField {
    /// Build a primary (master-to-meter) control field.
    #[inline]
    pub const fn primary(function: FunctionCode, fcb: bool, fcv: bool) -> Self {
        Self {
            res: false,
            prm: true,
            fcb,
            fcv,
            function: function.as_u8(),
        }
    }

    /// Parse from the wire byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            res: (value & 0x80) != 0,
            prm: (value & 0x40) != 0,
            fcb: (value & 0x20) != 0,
            fcv: (value & 0x10) != 0,
            function: value & 0x0F,
        }
    }

    /// Encode to the wire byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        (self.res as u8) << 7
            | (self.prm as u8) << 6
            | (self.fcb as u8) << 5
            | (self.fcv as u8) << 4
            | (self.function & 0x0F)
    }
}

impl std::fmt::Display for ControlField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "C(prm={} fcb={} fcv={} func={})",
            self.prm as u8, self.fcb as u8, self.fcv as u8, self.function
        )
    }
}

/// A fixed 6-byte control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFrame {
    /// Link control field
    pub control: ControlField,
    /// Station address (DER)
    pub der: u16,
}

impl FixedFrame {
    /// Build a primary fixed frame.
    pub const fn new(function: FunctionCode, fcb: bool, fcv: bool, der: u16) -> Self {
        Self {
            control: ControlField::primary(function, fcb, fcv),
            der,
        }
    }

    /// Encode to the 6-byte wire form.
    pub fn to_bytes(&self) -> [u8; FIXED_FRAME_LEN] {
        let der = self.der.to_le_bytes();
        let body = [self.control.as_u8(), der[0], der[1]];
        [
            FIXED_START_BYTE,
            body[0],
            body[1],
            body[2],
            checksum(&body),
            END_BYTE,
        ]
    }

    /// Parse a complete 6-byte frame.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        debug_assert_eq!(buf.len(), FIXED_FRAME_LEN);
        if buf[0] != FIXED_START_BYTE {
            return Err(Iec102Error::BadStartByte(buf[0]));
        }
        if buf[5] != END_BYTE {
            return Err(Iec102Error::WrongEndByte(buf[5]));
        }
        let computed = checksum(&buf[1..4]);
        if computed != buf[4] {
            return Err(Iec102Error::ChecksumMismatch {
                carried: buf[4],
                computed,
            });
        }
        Ok(Self {
            control: ControlField::from_u8(buf[1]),
            der: u16::from_le_bytes([buf[2], buf[3]]),
        })
    }
}

/// A variable-length data frame carrying one ASDU.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableFrame {
    /// Link control field
    pub control: ControlField,
    /// Station address (DER)
    pub der: u16,
    /// Message type identifier
    pub type_id: TypeId,
    /// Variable-structure qualifier (object/record count)
    pub qualifier: u8,
    /// Transmission cause and P/N flag
    pub cause: CauseField,
    /// Measurement-point address
    pub dir_pm: u16,
    /// Register address
    pub register: u8,
    /// Raw message data bytes
    pub data: Bytes,
    /// Decoded message, when the frame carries data
    pub payload: Option<Message>,
}

impl VariableFrame {
    /// Encode to the full wire form, including both length bytes, checksum
    /// and end marker. The declared length is derived from the data block.
    pub fn to_bytes(&self) -> BytesMut {
        let length = (ASDU_ENVELOPE_LEN + self.data.len()) as u8;
        let mut buf = BytesMut::with_capacity(usize::from(length) + VARIABLE_FRAME_OVERHEAD);
        buf.put_u8(VARIABLE_START_BYTE);
        buf.put_u8(length);
        buf.put_u8(length);
        buf.put_u8(VARIABLE_START_BYTE);
        buf.put_u8(self.control.as_u8());
        buf.put_u16_le(self.der);
        buf.put_u8(self.type_id.as_u8());
        buf.put_u8(self.qualifier);
        buf.put_u8(self.cause.as_u8());
        buf.put_u16_le(self.dir_pm);
        buf.put_u8(self.register);
        buf.put_slice(&self.data);
        let cs = checksum(&buf[4..4 + usize::from(length)]);
        buf.put_u8(cs);
        buf.put_u8(END_BYTE);
        buf
    }

    /// Parse a complete variable frame (all `declared length + 6` bytes).
    ///
    /// Validates both start markers, the duplicated length byte, the end
    /// marker and the checksum, then decodes the data block through the
    /// message registry.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf[0] != VARIABLE_START_BYTE {
            return Err(Iec102Error::BadStartByte(buf[0]));
        }
        let length = buf[1];
        if usize::from(length) < ASDU_ENVELOPE_LEN {
            // Too short to hold even the ASDU envelope.
            return Err(Iec102Error::LengthMismatch {
                declared: length,
                actual: ASDU_ENVELOPE_LEN as u8,
            });
        }
        if buf[2] != length {
            return Err(Iec102Error::LengthMismatch {
                declared: length,
                actual: buf[2],
            });
        }
        if buf[3] != VARIABLE_START_BYTE {
            return Err(Iec102Error::BadStartByte(buf[3]));
        }
        let total = usize::from(length) + VARIABLE_FRAME_OVERHEAD;
        debug_assert_eq!(buf.len(), total);
        if buf[total - 1] != END_BYTE {
            return Err(Iec102Error::WrongEndByte(buf[total - 1]));
        }
        let carried = buf[total - 2];
        let computed = checksum(&buf[4..4 + usize::from(length)]);
        if computed != carried {
            return Err(Iec102Error::ChecksumMismatch { carried, computed });
        }

        let type_id = TypeId::from_u8(buf[7])?;
        let qualifier = buf[8];
        let data = Bytes::copy_from_slice(&buf[13..4 + usize::from(length)]);
        let payload = if data.is_empty() {
            None
        } else {
            Some(registry::decode(type_id, &data, qualifier)?)
        };

        Ok(Self {
            control: ControlField::from_u8(buf[4]),
            der: u16::from_le_bytes([buf[5], buf[6]]),
            type_id,
            qualifier,
            cause: CauseField::from_u8(buf[9]),
            dir_pm: u16::from_le_bytes([buf[10], buf[11]]),
            register: buf[12],
            data,
            payload,
        })
    }

    /// The declared length this frame advertises on the wire.
    #[inline]
    pub fn declared_length(&self) -> u8 {
        (ASDU_ENVELOPE_LEN + self.data.len()) as u8
    }
}

impl std::fmt::Display for VariableFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] cause={:#04x} pn={} der={} pm={} reg={}",
            self.control,
            self.type_id,
            self.cause.code,
            self.cause.negative as u8,
            self.der,
            self.dir_pm,
            self.register
        )
    }
}

/// The atomic wire unit: either frame shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Fixed 6-byte control frame
    Fixed(FixedFrame),
    /// Variable-length data frame
    Variable(VariableFrame),
}

impl Frame {
    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> BytesMut {
        match self {
            Self::Fixed(frame) => BytesMut::from(&frame.to_bytes()[..]),
            Self::Variable(frame) => frame.to_bytes(),
        }
    }

    /// Check if this is a fixed frame.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    /// Get the variable frame, if that is this frame's shape.
    #[inline]
    pub fn as_variable(&self) -> Option<&VariableFrame> {
        match self {
            Self::Variable(frame) => Some(frame),
            Self::Fixed(_) => None,
        }
    }

    /// Consume into the variable frame, if that is this frame's shape.
    #[inline]
    pub fn into_variable(self) -> Option<VariableFrame> {
        match self {
            Self::Variable(frame) => Some(frame),
            Self::Fixed(_) => None,
        }
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(frame) => write!(f, "Fixed {} der={}", frame.control, frame.der),
            Self::Variable(frame) => write!(f, "Variable {}", frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cause;

    #[test]
    fn test_control_field_roundtrip() {
        let c = ControlField::primary(FunctionCode::LinkStatusRequest, false, false);
        assert_eq!(c.as_u8(), 0x49);
        assert_eq!(ControlField::from_u8(0x49), c);

        let c = ControlField::primary(FunctionCode::UserData, true, true);
        assert_eq!(c.as_u8(), 0x73);
        assert_eq!(ControlField::from_u8(0x73), c);

        let c = ControlField::primary(FunctionCode::ResetRemoteLink, false, false);
        assert_eq!(c.as_u8(), 0x40);
    }

    #[test]
    fn test_fixed_frame_golden() {
        // Link-status request to station 34572
        let frame = FixedFrame::new(FunctionCode::LinkStatusRequest, false, false, 34572);
        assert_eq!(frame.to_bytes(), [0x10, 0x49, 0x0c, 0x87, 0xdc, 0x16]);

        let parsed = FixedFrame::parse(&[0x10, 0x49, 0x0c, 0x87, 0xdc, 0x16]).unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(parsed.der, 34572);
        assert_eq!(parsed.control.function, 9);
    }

    #[test]
    fn test_fixed_frame_checksum_rejected() {
        let err = FixedFrame::parse(&[0x10, 0x49, 0x0c, 0x87, 0xdd, 0x16]).unwrap_err();
        assert!(matches!(err, Iec102Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_fixed_frame_wrong_end() {
        let err = FixedFrame::parse(&[0x10, 0x49, 0x0c, 0x87, 0xdc, 0x17]).unwrap_err();
        assert!(matches!(err, Iec102Error::WrongEndByte(0x17)));
    }

    #[test]
    fn test_variable_frame_golden() {
        // Authenticate with password 8, station 34572, measurement point 1
        let frame = VariableFrame {
            control: ControlField::primary(FunctionCode::UserData, true, true),
            der: 34572,
            type_id: TypeId::Authenticate,
            qualifier: 1,
            cause: CauseField::new(Cause::Activation),
            dir_pm: 1,
            register: 0,
            data: Bytes::from_static(&[0x08, 0x00, 0x00, 0x00]),
            payload: None,
        };
        let expected = [
            0x68, 0x0d, 0x0d, 0x68, 0x73, 0x0c, 0x87, 0xb7, 0x01, 0x06, 0x01, 0x00, 0x00, 0x08,
            0x00, 0x00, 0x00, 0xcd, 0x16,
        ];
        assert_eq!(&frame.to_bytes()[..], &expected[..]);
        assert_eq!(frame.declared_length(), 13);

        let parsed = VariableFrame::parse(&expected).unwrap();
        assert_eq!(parsed.der, 34572);
        assert_eq!(parsed.type_id, TypeId::Authenticate);
        assert_eq!(parsed.qualifier, 1);
        assert_eq!(parsed.cause.code, 0x06);
        assert!(!parsed.cause.negative);
        assert_eq!(parsed.dir_pm, 1);
        assert_eq!(parsed.register, 0);
        assert_eq!(&parsed.data[..], &[0x08, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parsed.payload,
            Some(Message::Authenticate { password: 8 })
        ));
    }

    #[test]
    fn test_variable_frame_checksum_rejected() {
        let mut raw = vec![
            0x68, 0x0d, 0x0d, 0x68, 0x73, 0x0c, 0x87, 0xb7, 0x01, 0x06, 0x01, 0x00, 0x00, 0x08,
            0x00, 0x00, 0x00, 0xcd, 0x16,
        ];
        raw[13] = 0x09; // mutate one payload byte
        let err = VariableFrame::parse(&raw).unwrap_err();
        assert!(matches!(err, Iec102Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_variable_frame_duplicate_length_rejected() {
        let raw = [
            0x68, 0x0d, 0x0c, 0x68, 0x73, 0x0c, 0x87, 0xb7, 0x01, 0x06, 0x01, 0x00, 0x00, 0x08,
            0x00, 0x00, 0x00, 0xcd, 0x16,
        ];
        let err = VariableFrame::parse(&raw).unwrap_err();
        assert!(matches!(
            err,
            Iec102Error::LengthMismatch {
                declared: 0x0d,
                actual: 0x0c
            }
        ));
    }

    #[test]
    fn test_variable_frame_empty_data() {
        // End-session carries no data: declared length is exactly the envelope
        let frame = VariableFrame {
            control: ControlField::primary(FunctionCode::UserData, false, true),
            der: 1,
            type_id: TypeId::FinishSession,
            qualifier: 0,
            cause: CauseField::new(Cause::Activation),
            dir_pm: 1,
            register: 0,
            data: Bytes::new(),
            payload: None,
        };
        assert_eq!(frame.declared_length(), 9);
        let raw = frame.to_bytes();
        assert_eq!(raw.len(), 15);

        let parsed = VariableFrame::parse(&raw).unwrap();
        assert_eq!(parsed.type_id, TypeId::FinishSession);
        assert!(parsed.payload.is_none());
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame::Fixed(FixedFrame::new(
            FunctionCode::LinkStatusRequest,
            false,
            false,
            34572,
        ));
        assert!(format!("{}", frame).contains("der=34572"));
    }
}
