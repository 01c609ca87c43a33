//! IEC 60870-5-102 type identification.
//!
//! The type identifier is the first byte of a variable frame's ASDU and
//! selects the payload layout.

use crate::error::{Iec102Error, Result};

/// IEC 60870-5-102 type identification.
///
/// Identifies the kind of information carried by an ASDU. Requests travel
/// in the control direction (master to meter), responses in the monitoring
/// direction (meter to master).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    // ============================================
    // Monitoring direction (meter to master)
    // ============================================
    /// Absolute integrated totals, 4-octet counter readings (M_IT_TG_2)
    AbsoluteTotals = 8,

    /// Incremental integrated totals, 4-octet energy increments (M_IT_TK_2)
    IncrementalTotals = 11,

    /// Manufacturer and equipment identifier (P_MP_NA_2)
    ManufacturerId = 71,

    /// Current date and time (M_TI_TA_2)
    DateTime = 72,

    /// Daylight-saving switch dates (M_CH_TA_2)
    DaylightChangeDates = 131,

    /// Tariff information, current values (M_TA_VC_2)
    CurrentTariff = 135,

    /// Tariff information, stored billing values (M_TA_VM_2)
    StoredTariff = 136,

    /// Blocks of integrated totals for one object address (M_IB_TK_2)
    BlockTotals = 140,

    /// Metering-point configuration (M_RM_NA_2)
    Configuration = 142,

    /// Contracted powers (M_PC_NA_2)
    ContractedPowers = 145,

    /// Instant values, protocol extension (P_TA_IN_2)
    InstantValues = 163,

    // ============================================
    // Control direction (master to meter)
    // ============================================
    /// Read manufacturer and equipment identifier (C_RD_NA_2)
    ReadManufacturerId = 100,

    /// Read current date and time (C_TI_NA_2)
    ReadDateTime = 103,

    /// Read absolute integrated totals by time range (C_CI_NT_2)
    ReadAbsoluteTotals = 122,

    /// Read incremental integrated totals by time range (C_CI_NU_2)
    ReadIncrementalTotals = 123,

    /// Read tariff information, current values (C_TA_VC_2)
    ReadCurrentTariff = 133,

    /// Read tariff information, stored billing values (C_TA_VM_2)
    ReadStoredTariff = 134,

    /// Read metering-point configuration (C_RM_NA_2)
    ReadConfiguration = 141,

    /// Read contracted powers (C_PC_NA_2)
    ReadContractedPowers = 144,

    /// Read instant values, protocol extension (P_IN_VA_2)
    ReadInstantValues = 162,

    /// Set date and time (C_CS_TA_2)
    SetDateTime = 181,

    /// Authenticate with the metering-point password (C_AC_NA_2)
    Authenticate = 183,

    /// Read daylight-saving switch dates (C_CH_TA_2)
    ReadDaylightChangeDates = 185,

    /// Finish the session (C_FS_NA_2)
    FinishSession = 187,

    /// Read blocks of integrated totals for one object address (C_CB_UN_2)
    ReadBlockTotals = 190,
}

impl TypeId {
    /// Create a TypeId from the raw byte value.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            8 => Ok(Self::AbsoluteTotals),
            11 => Ok(Self::IncrementalTotals),
            71 => Ok(Self::ManufacturerId),
            72 => Ok(Self::DateTime),
            100 => Ok(Self::ReadManufacturerId),
            103 => Ok(Self::ReadDateTime),
            122 => Ok(Self::ReadAbsoluteTotals),
            123 => Ok(Self::ReadIncrementalTotals),
            131 => Ok(Self::DaylightChangeDates),
            133 => Ok(Self::ReadCurrentTariff),
            134 => Ok(Self::ReadStoredTariff),
            135 => Ok(Self::CurrentTariff),
            136 => Ok(Self::StoredTariff),
            140 => Ok(Self::BlockTotals),
            141 => Ok(Self::ReadConfiguration),
            142 => Ok(Self::Configuration),
            144 => Ok(Self::ReadContractedPowers),
            145 => Ok(Self::ContractedPowers),
            162 => Ok(Self::ReadInstantValues),
            163 => Ok(Self::InstantValues),
            181 => Ok(Self::SetDateTime),
            183 => Ok(Self::Authenticate),
            185 => Ok(Self::ReadDaylightChangeDates),
            187 => Ok(Self::FinishSession),
            190 => Ok(Self::ReadBlockTotals),
            _ => Err(Iec102Error::UnknownMessageType(value)),
        }
    }

    /// Convert to the raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this type travels in the monitoring direction (meter to
    /// master).
    #[inline]
    pub const fn is_monitoring(&self) -> bool {
        matches!(
            self,
            Self::AbsoluteTotals
                | Self::IncrementalTotals
                | Self::ManufacturerId
                | Self::DateTime
                | Self::DaylightChangeDates
                | Self::CurrentTariff
                | Self::StoredTariff
                | Self::BlockTotals
                | Self::Configuration
                | Self::ContractedPowers
                | Self::InstantValues
        )
    }

    /// Check if this type travels in the control direction (master to
    /// meter).
    #[inline]
    pub const fn is_control(&self) -> bool {
        !self.is_monitoring()
    }

    /// Check if the protocol allows this response type to paginate via
    /// repeated request-or-requested (0x05) causes.
    ///
    /// These are exactly the multi-record response kinds; every other type
    /// arriving with cause 0x05 is a single-shot delivery.
    #[inline]
    pub const fn is_continuation_capable(&self) -> bool {
        matches!(
            self,
            Self::AbsoluteTotals
                | Self::IncrementalTotals
                | Self::CurrentTariff
                | Self::StoredTariff
                | Self::BlockTotals
        )
    }

    /// Get the IEC companion-standard name (e.g. "C_AC_NA_2").
    #[inline]
    pub const fn standard_name(&self) -> &'static str {
        match self {
            Self::AbsoluteTotals => "M_IT_TG_2",
            Self::IncrementalTotals => "M_IT_TK_2",
            Self::ManufacturerId => "P_MP_NA_2",
            Self::DateTime => "M_TI_TA_2",
            Self::DaylightChangeDates => "M_CH_TA_2",
            Self::CurrentTariff => "M_TA_VC_2",
            Self::StoredTariff => "M_TA_VM_2",
            Self::BlockTotals => "M_IB_TK_2",
            Self::Configuration => "M_RM_NA_2",
            Self::ContractedPowers => "M_PC_NA_2",
            Self::InstantValues => "P_TA_IN_2",
            Self::ReadManufacturerId => "C_RD_NA_2",
            Self::ReadDateTime => "C_TI_NA_2",
            Self::ReadAbsoluteTotals => "C_CI_NT_2",
            Self::ReadIncrementalTotals => "C_CI_NU_2",
            Self::ReadCurrentTariff => "C_TA_VC_2",
            Self::ReadStoredTariff => "C_TA_VM_2",
            Self::ReadConfiguration => "C_RM_NA_2",
            Self::ReadContractedPowers => "C_PC_NA_2",
            Self::ReadInstantValues => "P_IN_VA_2",
            Self::SetDateTime => "C_CS_TA_2",
            Self::Authenticate => "C_AC_NA_2",
            Self::ReadDaylightChangeDates => "C_CH_TA_2",
            Self::FinishSession => "C_FS_NA_2",
            Self::ReadBlockTotals => "C_CB_UN_2",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.standard_name())
    }
}
