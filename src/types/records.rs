//! Typed payload records.
//!
//! Plain data carried inside decoded messages: totals, billing registers,
//! contracted powers, instant values and identification blocks.

use crate::types::TimeA;

/// One integrated total: a counter reading or energy increment for one
/// object address, stamped with the end of its integration period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegratedTotal {
    /// Object address within the register (1-based)
    pub address: u8,
    /// 4-octet total, kWh or kVArh
    pub total: u32,
    /// Quality and sequence-number byte as received
    pub quality: u8,
    /// End of the integration period
    pub timestamp: TimeA,
}

/// A batch of integrated totals sharing one trailing period label, as
/// carried by one absolute- or incremental-totals frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegratedTotalsSeries {
    /// The totals, in wire order; each carries the shared label
    pub totals: Vec<IntegratedTotal>,
    /// End of the shared integration period
    pub end_of_period: TimeA,
}

/// Time range of a totals request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsRequest {
    /// First object address requested
    pub first: u8,
    /// Last object address requested
    pub last: u8,
    /// Start of the requested period
    pub start: TimeA,
    /// End of the requested period
    pub end: TimeA,
}

impl TotalsRequest {
    /// Request the full object range 1..=8 over the given period.
    pub const fn new(start: TimeA, end: TimeA) -> Self {
        Self {
            first: 1,
            last: 8,
            start,
            end,
        }
    }
}

/// One object group of a block-totals frame: the per-object totals plus
/// their period label. The number of totals is fixed by the object
/// address: 9 carries 8, 10 carries 6, 11 carries 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTotalsGroup {
    /// Object address (9, 10 or 11)
    pub object: u8,
    /// Totals with 1-based positional addresses
    pub totals: Vec<IntegratedTotal>,
    /// End of the group's integration period
    pub timestamp: TimeA,
}

/// Number of totals per block-totals object address, `None` for an
/// unknown address.
#[inline]
pub fn block_object_count(object: u8) -> Option<usize> {
    match object {
        9 => Some(8),
        10 => Some(6),
        11 => Some(3),
        _ => None,
    }
}

/// One 63-byte billing register (tariff information), current or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingRegister {
    /// Register object address
    pub address: u8,
    /// Absolute active energy
    pub active_abs: u32,
    /// Incremental active energy
    pub active_inc: u32,
    /// Active energy quality
    pub active_qual: u8,
    /// Absolute inductive reactive energy
    pub reactive_abs_ind: u32,
    /// Incremental inductive reactive energy
    pub reactive_inc_ind: u32,
    /// Inductive reactive quality
    pub reactive_qual_ind: u8,
    /// Absolute capacitive reactive energy
    pub reactive_abs_cap: u32,
    /// Incremental capacitive reactive energy
    pub reactive_inc_cap: u32,
    /// Capacitive reactive quality
    pub reactive_qual_cap: u8,
    /// Reserved register 7
    pub reserved_7: u32,
    /// Reserved register 7 quality
    pub reserved_7_qual: u8,
    /// Reserved register 8
    pub reserved_8: u32,
    /// Reserved register 8 quality
    pub reserved_8_qual: u8,
    /// Maximum power of the period
    pub max_power: u32,
    /// Instant of the maximum power
    pub max_power_date: TimeA,
    /// Maximum power quality
    pub max_power_qual: u8,
    /// Excess power of the period
    pub excess_power: u32,
    /// Excess power quality
    pub excess_power_qual: u8,
    /// Billing period start
    pub period_start: TimeA,
    /// Billing period end
    pub period_end: TimeA,
}

/// One contracted power entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractedPower {
    /// Contract object address
    pub address: u8,
    /// Contracted power in W
    pub power: u32,
}

/// Object classes of the instant-values protocol extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstantObject {
    /// Energy totalisers
    Totalisers = 1,
    /// Instantaneous power
    Power = 2,
    /// Instantaneous voltage and current
    VoltageCurrent = 3,
}

impl InstantObject {
    /// Number of (value, quality) pairs this object carries.
    #[inline]
    pub const fn value_count(&self) -> usize {
        match self {
            Self::Totalisers => 3,
            Self::Power => 3,
            Self::VoltageCurrent => 6,
        }
    }

    /// Parse from the wire object code.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Totalisers),
            2 => Some(Self::Power),
            3 => Some(Self::VoltageCurrent),
            _ => None,
        }
    }

    /// Convert to the wire object code.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One instant value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantValue {
    /// Position within the object's value list (1-based)
    pub index: u8,
    /// Raw 4-octet value
    pub value: u32,
    /// Quality byte as received
    pub quality: u8,
}

/// The instant values of one object class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantValuesGroup {
    /// Object class
    pub object: InstantObject,
    /// Values in wire order, indexed 1..=N
    pub values: Vec<InstantValue>,
}

/// Manufacturer and equipment identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerId {
    /// Manufacturer code
    pub manufacturer: u8,
    /// Equipment serial code
    pub equipment: u32,
}

/// Metering-point configuration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterConfiguration {
    /// Manufacturer code
    pub manufacturer: u8,
    /// Equipment serial code
    pub equipment: u32,
    /// Firmware version
    pub firmware_version: u8,
    /// Integration period in minutes
    pub integration_period: u8,
    /// Battery end-of-life estimate
    pub battery_end: TimeA,
    /// Whether the meter applies daylight-saving switching
    pub dst_enabled: bool,
}
