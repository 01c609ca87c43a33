//! IEC 60870-5-102 cause of transmission.
//!
//! The cause byte of a variable frame carries a 6-bit cause code plus the
//! positive/negative confirmation flag in bit 6. The cause of the most
//! recent response drives every transition of the session state machine.

use crate::error::{Iec102Error, Result};

/// Cause of transmission.
///
/// The classified subset of cause codes this protocol produces. Response
/// frames with any other code terminate the exchange with
/// [`Iec102Error::UnknownCause`] — the protocol's behaviour is undefined
/// there and must not be guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cause {
    /// Request or requested (5): data delivery, possibly one page of many
    Request = 0x05,

    /// Activation (6): carried by parameterised requests and writes
    Activation = 0x06,

    /// Activation confirmation (7)
    ActivationConfirm = 0x07,

    /// Activation termination (10)
    ActivationTermination = 0x0A,

    /// Requested ASDU type not available (14)
    TypeNotAvailable = 0x0E,

    /// Addressing direction specification unknown (16)
    DirectionUnknown = 0x10,

    /// Requested information object not available (17)
    ObjectNotAvailable = 0x11,

    /// Requested integration period not available (18)
    PeriodNotAvailable = 0x12,
}

impl Cause {
    /// Classify the lower 6 bits of a cause byte.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value & 0x3F {
            0x05 => Ok(Self::Request),
            0x06 => Ok(Self::Activation),
            0x07 => Ok(Self::ActivationConfirm),
            0x0A => Ok(Self::ActivationTermination),
            0x0E => Ok(Self::TypeNotAvailable),
            0x10 => Ok(Self::DirectionUnknown),
            0x11 => Ok(Self::ObjectNotAvailable),
            0x12 => Ok(Self::PeriodNotAvailable),
            other => Err(Iec102Error::UnknownCause(other)),
        }
    }

    /// Convert to the raw cause code.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this cause ends an exchange successfully regardless of the
    /// response type.
    #[inline]
    pub const fn is_terminal_ok(&self) -> bool {
        matches!(self, Self::ActivationConfirm | Self::ActivationTermination)
    }

    /// Check if this cause reports a meter-side error condition.
    #[inline]
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::TypeNotAvailable
                | Self::DirectionUnknown
                | Self::ObjectNotAvailable
                | Self::PeriodNotAvailable
        )
    }

    /// Map an error cause to its typed session error.
    ///
    /// Returns `None` for non-error causes.
    pub fn to_error(self) -> Option<Iec102Error> {
        match self {
            Self::TypeNotAvailable => Some(Iec102Error::TypeNotAvailable),
            Self::DirectionUnknown => Some(Iec102Error::DirectionUnknown),
            Self::ObjectNotAvailable | Self::PeriodNotAvailable => {
                Some(Iec102Error::IntegrationPeriodNotAvailable)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "Request"),
            Self::Activation => write!(f, "Activation"),
            Self::ActivationConfirm => write!(f, "ActivationConfirm"),
            Self::ActivationTermination => write!(f, "ActivationTermination"),
            Self::TypeNotAvailable => write!(f, "TypeNotAvailable"),
            Self::DirectionUnknown => write!(f, "DirectionUnknown"),
            Self::ObjectNotAvailable => write!(f, "ObjectNotAvailable"),
            Self::PeriodNotAvailable => write!(f, "PeriodNotAvailable"),
        }
    }
}

/// The cause byte of a variable frame: 6-bit cause code plus the
/// positive/negative flag in bit 6.
///
/// Parsing keeps the raw code so that an unclassified cause can be
/// reported verbatim when the session rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CauseField {
    /// Raw 6-bit cause code as received
    pub code: u8,
    /// Negative confirmation flag (bit 6)
    pub negative: bool,
}

impl CauseField {
    /// Build a cause field from a classified cause.
    #[inline]
    pub const fn new(cause: Cause) -> Self {
        Self {
            code: cause.as_u8(),
            negative: false,
        }
    }

    /// Parse from the wire byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            code: value & 0x3F,
            negative: (value & 0x40) != 0,
        }
    }

    /// Encode to the wire byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        self.code | if self.negative { 0x40 } else { 0 }
    }

    /// Classify the cause code.
    #[inline]
    pub fn cause(&self) -> Result<Cause> {
        Cause::from_u8(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_from_u8() {
        assert_eq!(Cause::from_u8(0x05).unwrap(), Cause::Request);
        assert_eq!(Cause::from_u8(0x06).unwrap(), Cause::Activation);
        assert_eq!(Cause::from_u8(0x07).unwrap(), Cause::ActivationConfirm);
        assert_eq!(Cause::from_u8(0x0A).unwrap(), Cause::ActivationTermination);
        assert_eq!(Cause::from_u8(0x0E).unwrap(), Cause::TypeNotAvailable);
        assert_eq!(Cause::from_u8(0x10).unwrap(), Cause::DirectionUnknown);
        assert_eq!(Cause::from_u8(0x11).unwrap(), Cause::ObjectNotAvailable);
        assert_eq!(Cause::from_u8(0x12).unwrap(), Cause::PeriodNotAvailable);
    }

    #[test]
    fn test_cause_unknown_is_error() {
        for val in [0x00, 0x01, 0x0B, 0x13, 0x2A, 0x3F] {
            match Cause::from_u8(val) {
                Err(Iec102Error::UnknownCause(code)) => assert_eq!(code, val),
                other => panic!("expected UnknownCause for 0x{:02x}, got {:?}", val, other),
            }
        }
    }

    #[test]
    fn test_cause_upper_bits_masked() {
        // 0x45 = negative flag + cause 5
        assert_eq!(Cause::from_u8(0x45).unwrap(), Cause::Request);
        // 0x87 = bit 7 set + cause 7
        assert_eq!(Cause::from_u8(0x87).unwrap(), Cause::ActivationConfirm);
    }

    #[test]
    fn test_cause_predicates() {
        assert!(Cause::ActivationConfirm.is_terminal_ok());
        assert!(Cause::ActivationTermination.is_terminal_ok());
        assert!(!Cause::Request.is_terminal_ok());

        assert!(Cause::TypeNotAvailable.is_error());
        assert!(Cause::PeriodNotAvailable.is_error());
        assert!(!Cause::Activation.is_error());
    }

    #[test]
    fn test_cause_to_error() {
        assert!(matches!(
            Cause::TypeNotAvailable.to_error(),
            Some(Iec102Error::TypeNotAvailable)
        ));
        assert!(matches!(
            Cause::DirectionUnknown.to_error(),
            Some(Iec102Error::DirectionUnknown)
        ));
        assert!(matches!(
            Cause::ObjectNotAvailable.to_error(),
            Some(Iec102Error::IntegrationPeriodNotAvailable)
        ));
        assert!(matches!(
            Cause::PeriodNotAvailable.to_error(),
            Some(Iec102Error::IntegrationPeriodNotAvailable)
        ));
        assert!(Cause::Request.to_error().is_none());
        assert!(Cause::ActivationConfirm.to_error().is_none());
    }

    #[test]
    fn test_cause_field_roundtrip() {
        let field = CauseField::from_u8(0x46);
        assert_eq!(field.code, 0x06);
        assert!(field.negative);
        assert_eq!(field.as_u8(), 0x46);

        let field = CauseField::new(Cause::Request);
        assert_eq!(field.as_u8(), 0x05);
        assert!(!field.negative);
        assert_eq!(field.cause().unwrap(), Cause::Request);
    }
}
