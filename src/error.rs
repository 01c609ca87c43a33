//! Error types for the IEC 60870-5-102 protocol.

use thiserror::Error;

/// Result type alias for IEC 102 operations.
pub type Result<T> = std::result::Result<T, Iec102Error>;

/// IEC 60870-5-102 protocol error types.
#[derive(Debug, Error)]
pub enum Iec102Error {
    /// I/O error on the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection attempt timed out
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// Not connected to the meter
    #[error("Not connected")]
    NotConnected,

    /// No complete frame arrived within the receive timeout
    #[error("Frame timeout: no frame received")]
    FrameTimeout,

    /// First byte of a frame is neither a fixed- nor a variable-frame marker
    #[error("Bad start byte: 0x{0:02x}")]
    BadStartByte(u8),

    /// Embedded checksum does not match the recomputed sum
    #[error("Checksum mismatch: frame carries 0x{carried:02x}, computed 0x{computed:02x}")]
    ChecksumMismatch { carried: u8, computed: u8 },

    /// Frame does not terminate with the end marker
    #[error("Wrong end byte: 0x{0:02x}")]
    WrongEndByte(u8),

    /// Declared length disagrees with the frame contents
    #[error("Length mismatch: declared {declared}, got {actual}")]
    LengthMismatch { declared: u8, actual: u8 },

    /// Payload ends before the layout implied by type and qualifier
    #[error("Payload too short for type {type_id}: need {needed} bytes, got {got}")]
    PayloadTooShort {
        type_id: u8,
        needed: usize,
        got: usize,
    },

    /// Payload bytes do not form a valid record for the message type
    #[error("Malformed payload: {0}")]
    PayloadMalformed(String),

    /// Type identifier absent from the ASDU registry
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    /// Link or application exchange violated the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Meter reports the requested ASDU type as unavailable (cause 0x0E)
    #[error("Requested ASDU type not available")]
    TypeNotAvailable,

    /// Meter reports the addressing direction as unknown (cause 0x10)
    #[error("ASDU direction specification unknown")]
    DirectionUnknown,

    /// Meter reports the information object or integration period as
    /// unavailable (cause 0x11 / 0x12)
    #[error("Integration period not available")]
    IntegrationPeriodNotAvailable,

    /// Transmission cause outside the classified set; the exchange cannot
    /// be interpreted and the session must not continue
    #[error("Unknown transmission cause: 0x{0:02x}")]
    UnknownCause(u8),

    /// A previous data-retrieval stream was dropped before its terminal
    /// cause; the transport is mid-stream and the session is unusable
    #[error("Previous response stream not exhausted")]
    StreamNotExhausted,
}

impl Iec102Error {
    /// Create a protocol error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a malformed-payload error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::PayloadMalformed(msg.into())
    }

    /// Check if this error is a framing defect (the link layer treats these
    /// as "no frame received").
    pub fn is_framing_error(&self) -> bool {
        matches!(
            self,
            Self::BadStartByte(_)
                | Self::ChecksumMismatch { .. }
                | Self::WrongEndByte(_)
                | Self::LengthMismatch { .. }
        )
    }

    /// Check if this error was classified from a response transmission
    /// cause.
    pub fn is_cause_error(&self) -> bool {
        matches!(
            self,
            Self::TypeNotAvailable
                | Self::DirectionUnknown
                | Self::IntegrationPeriodNotAvailable
                | Self::UnknownCause(_)
        )
    }

    /// Check if a caller may reasonably treat this error as "no data
    /// available" rather than a hard failure.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            Self::TypeNotAvailable | Self::IntegrationPeriodNotAvailable
        )
    }
}
