//! ASDU message codecs.
//!
//! One [`Message`] variant per type identifier in the registry, with the
//! byte-exact payload layout of each. Decoding consumes exactly the bytes
//! implied by the layout (fixed, or derived from the variable-structure
//! qualifier) and fails with a typed error instead of reading out of
//! bounds; encoding produces the byte count the frame's declared length
//! will advertise.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Iec102Error, Result};
use crate::types::{
    block_object_count, BillingRegister, BlockTotalsGroup, Cause, ContractedPower, InstantObject,
    InstantValue, InstantValuesGroup, IntegratedTotal, IntegratedTotalsSeries, ManufacturerId,
    MeterConfiguration, TimeA, TimeB, TotalsRequest, TypeId, ASDU_ENVELOPE_LEN,
};

/// One ASDU message, typed by its payload layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// 183 - authenticate with the metering-point password
    Authenticate {
        /// Password, sent as a 4-byte little-endian integer
        password: u32,
    },
    /// 187 - finish the session
    FinishSession,
    /// 103 - read current date and time
    ReadDateTime,
    /// 72 - current date and time
    DateTime(TimeB),
    /// 181 - set date and time (the meter echoes this type on confirm)
    SetDateTime(TimeB),
    /// 100 - read manufacturer and equipment identifier
    ReadManufacturerId,
    /// 71 - manufacturer and equipment identifier
    ManufacturerId(ManufacturerId),
    /// 122 - read absolute integrated totals over a period
    ReadAbsoluteTotals(TotalsRequest),
    /// 123 - read incremental integrated totals over a period
    ReadIncrementalTotals(TotalsRequest),
    /// 8 - absolute integrated totals
    AbsoluteTotals(IntegratedTotalsSeries),
    /// 11 - incremental integrated totals
    IncrementalTotals(IntegratedTotalsSeries),
    /// 133 - read tariff information, current values
    ReadCurrentTariff,
    /// 134 - read tariff information, stored values over a period
    ReadStoredTariff {
        /// Start of the requested period
        start: TimeA,
        /// End of the requested period
        end: TimeA,
    },
    /// 135 - tariff information, current values
    CurrentTariff(BillingRegister),
    /// 136 - tariff information, stored values
    StoredTariff(BillingRegister),
    /// 190 - read blocks of integrated totals for one object address
    ReadBlockTotals {
        /// Object address (9, 10 or 11)
        object: u8,
        /// Start of the requested period
        start: TimeA,
        /// End of the requested period
        end: TimeA,
    },
    /// 140 - blocks of integrated totals
    BlockTotals {
        /// Per-object groups in wire order
        groups: Vec<BlockTotalsGroup>,
    },
    /// 141 - read metering-point configuration
    ReadConfiguration,
    /// 142 - metering-point configuration
    Configuration(MeterConfiguration),
    /// 144 - read contracted powers
    ReadContractedPowers,
    /// 145 - contracted powers
    ContractedPowers {
        /// Contract entries in wire order
        powers: Vec<ContractedPower>,
        /// Label the entries were captured at
        timestamp: TimeA,
    },
    /// 185 - read daylight-saving switch dates
    ReadDaylightChangeDates,
    /// 131 - daylight-saving switch dates
    DaylightChangeDates {
        /// Winter-to-summer switch instant
        winter_to_summer: TimeA,
        /// Summer-to-winter switch instant
        summer_to_winter: TimeA,
    },
    /// 162 - read instant values (protocol extension)
    ReadInstantValues {
        /// Object classes requested
        objects: Vec<InstantObject>,
    },
    /// 163 - instant values (protocol extension)
    InstantValues {
        /// Per-object groups in wire order
        groups: Vec<InstantValuesGroup>,
        /// Capture instant
        timestamp: TimeB,
    },
}

impl Message {
    /// The type identifier this message travels under.
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::Authenticate { .. } => TypeId::Authenticate,
            Self::FinishSession => TypeId::FinishSession,
            Self::ReadDateTime => TypeId::ReadDateTime,
            Self::DateTime(_) => TypeId::DateTime,
            Self::SetDateTime(_) => TypeId::SetDateTime,
            Self::ReadManufacturerId => TypeId::ReadManufacturerId,
            Self::ManufacturerId(_) => TypeId::ManufacturerId,
            Self::ReadAbsoluteTotals(_) => TypeId::ReadAbsoluteTotals,
            Self::ReadIncrementalTotals(_) => TypeId::ReadIncrementalTotals,
            Self::AbsoluteTotals(_) => TypeId::AbsoluteTotals,
            Self::IncrementalTotals(_) => TypeId::IncrementalTotals,
            Self::ReadCurrentTariff => TypeId::ReadCurrentTariff,
            Self::ReadStoredTariff { .. } => TypeId::ReadStoredTariff,
            Self::CurrentTariff(_) => TypeId::CurrentTariff,
            Self::StoredTariff(_) => TypeId::StoredTariff,
            Self::ReadBlockTotals { .. } => TypeId::ReadBlockTotals,
            Self::BlockTotals { .. } => TypeId::BlockTotals,
            Self::ReadConfiguration => TypeId::ReadConfiguration,
            Self::Configuration(_) => TypeId::Configuration,
            Self::ReadContractedPowers => TypeId::ReadContractedPowers,
            Self::ContractedPowers { .. } => TypeId::ContractedPowers,
            Self::ReadDaylightChangeDates => TypeId::ReadDaylightChangeDates,
            Self::DaylightChangeDates { .. } => TypeId::DaylightChangeDates,
            Self::ReadInstantValues { .. } => TypeId::ReadInstantValues,
            Self::InstantValues { .. } => TypeId::InstantValues,
        }
    }

    /// The transmission cause a request of this kind is sent with: 6
    /// (activation) for parameterised requests and writes, 5 (request) for
    /// plain reads. Responses report 5; the value a meter actually sends
    /// always comes from the wire.
    pub fn request_cause(&self) -> Cause {
        match self {
            Self::Authenticate { .. }
            | Self::FinishSession
            | Self::SetDateTime(_)
            | Self::ReadAbsoluteTotals(_)
            | Self::ReadIncrementalTotals(_)
            | Self::ReadCurrentTariff
            | Self::ReadStoredTariff { .. }
            | Self::ReadBlockTotals { .. } => Cause::Activation,
            _ => Cause::Request,
        }
    }

    /// The variable-structure qualifier this message is sent with: the
    /// object/record count for multi-object payloads, 1 for a single data
    /// block, 0 for an empty one.
    pub fn qualifier(&self) -> u8 {
        match self {
            Self::FinishSession
            | Self::ReadDateTime
            | Self::ReadManufacturerId
            | Self::ReadCurrentTariff
            | Self::ReadConfiguration
            | Self::ReadContractedPowers
            | Self::ReadDaylightChangeDates => 0,
            Self::Authenticate { .. }
            | Self::DateTime(_)
            | Self::SetDateTime(_)
            | Self::ManufacturerId(_)
            | Self::ReadAbsoluteTotals(_)
            | Self::ReadIncrementalTotals(_)
            | Self::ReadStoredTariff { .. }
            | Self::CurrentTariff(_)
            | Self::StoredTariff(_)
            | Self::ReadBlockTotals { .. }
            | Self::Configuration(_)
            | Self::DaylightChangeDates { .. } => 1,
            Self::AbsoluteTotals(series) | Self::IncrementalTotals(series) => {
                series.totals.len() as u8
            }
            Self::BlockTotals { groups } => groups.len() as u8,
            Self::ContractedPowers { powers, .. } => powers.len() as u8,
            Self::ReadInstantValues { objects } => objects.len() as u8,
            Self::InstantValues { groups, .. } => groups.len() as u8,
        }
    }

    /// Encode the message-specific data block.
    pub fn encode_data(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Self::Authenticate { password } => buf.put_u32_le(*password),
            Self::FinishSession
            | Self::ReadDateTime
            | Self::ReadManufacturerId
            | Self::ReadCurrentTariff
            | Self::ReadConfiguration
            | Self::ReadContractedPowers
            | Self::ReadDaylightChangeDates => {}
            Self::DateTime(time) | Self::SetDateTime(time) => buf.put_slice(&time.encode()),
            Self::ManufacturerId(id) => {
                buf.put_u8(0);
                buf.put_u8(id.manufacturer);
                buf.put_u32_le(id.equipment);
            }
            Self::ReadAbsoluteTotals(req) | Self::ReadIncrementalTotals(req) => {
                buf.put_u8(req.first);
                buf.put_u8(req.last);
                buf.put_slice(&req.start.encode());
                buf.put_slice(&req.end.encode());
            }
            Self::AbsoluteTotals(series) | Self::IncrementalTotals(series) => {
                for total in &series.totals {
                    buf.put_u8(total.address);
                    buf.put_u32_le(total.total);
                    buf.put_u8(total.quality);
                }
                buf.put_slice(&series.end_of_period.encode());
            }
            Self::ReadStoredTariff { start, end } => {
                buf.put_slice(&start.encode());
                buf.put_slice(&end.encode());
            }
            Self::CurrentTariff(reg) | Self::StoredTariff(reg) => encode_billing(&mut buf, reg),
            Self::ReadBlockTotals { object, start, end } => {
                buf.put_u8(*object);
                buf.put_slice(&start.encode());
                buf.put_slice(&end.encode());
            }
            Self::BlockTotals { groups } => {
                for group in groups {
                    buf.put_u8(group.object);
                    for total in &group.totals {
                        buf.put_u32_le(total.total);
                        buf.put_u8(total.quality);
                    }
                    buf.put_slice(&group.timestamp.encode());
                }
            }
            Self::Configuration(config) => {
                buf.put_u8(config.manufacturer);
                buf.put_u32_le(config.equipment);
                buf.put_u8(config.firmware_version);
                buf.put_u8(config.integration_period);
                buf.put_slice(&config.battery_end.encode());
                buf.put_u8(config.dst_enabled as u8);
            }
            Self::ContractedPowers { powers, timestamp } => {
                for entry in powers {
                    buf.put_u8(entry.address);
                    buf.put_u32_le(entry.power);
                }
                buf.put_slice(&timestamp.encode());
            }
            Self::DaylightChangeDates {
                winter_to_summer,
                summer_to_winter,
            } => {
                buf.put_slice(&winter_to_summer.encode());
                buf.put_slice(&summer_to_winter.encode());
            }
            Self::ReadInstantValues { objects } => {
                for object in objects {
                    buf.put_u8(object.as_u8());
                }
            }
            Self::InstantValues { groups, timestamp } => {
                for group in groups {
                    buf.put_u8(group.object.as_u8());
                    for value in &group.values {
                        buf.put_u32_le(value.value);
                        buf.put_u8(value.quality);
                    }
                }
                buf.put_slice(&timestamp.encode());
            }
        }
        buf.freeze()
    }

    /// The declared frame length a frame carrying this message advertises:
    /// the data length plus the 9-byte ASDU envelope.
    pub fn frame_length(&self) -> u8 {
        (ASDU_ENVELOPE_LEN + self.encode_data().len()) as u8
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_id())
    }
}

fn encode_billing(buf: &mut BytesMut, reg: &BillingRegister) {
    buf.put_u8(reg.address);
    buf.put_u32_le(reg.active_abs);
    buf.put_u32_le(reg.active_inc);
    buf.put_u8(reg.active_qual);
    buf.put_u32_le(reg.reactive_abs_ind);
    buf.put_u32_le(reg.reactive_inc_ind);
    buf.put_u8(reg.reactive_qual_ind);
    buf.put_u32_le(reg.reactive_abs_cap);
    buf.put_u32_le(reg.reactive_inc_cap);
    buf.put_u8(reg.reactive_qual_cap);
    buf.put_u32_le(reg.reserved_7);
    buf.put_u8(reg.reserved_7_qual);
    buf.put_u32_le(reg.reserved_8);
    buf.put_u8(reg.reserved_8_qual);
    buf.put_u32_le(reg.max_power);
    buf.put_slice(&reg.max_power_date.encode());
    buf.put_u8(reg.max_power_qual);
    buf.put_u32_le(reg.excess_power);
    buf.put_u8(reg.excess_power_qual);
    buf.put_slice(&reg.period_start.encode());
    buf.put_slice(&reg.period_end.encode());
}

/// Cursor over a payload with typed, bounds-checked reads.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    type_id: TypeId,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], type_id: TypeId) -> Self {
        Self {
            data,
            pos: 0,
            type_id,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Iec102Error::PayloadTooShort {
                type_id: self.type_id.as_u8(),
                needed: self.pos + n,
                got: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn time_a(&mut self) -> Result<TimeA> {
        TimeA::decode(self.take(TimeA::SIZE)?)
    }

    fn time_b(&mut self) -> Result<TimeB> {
        TimeB::decode(self.take(TimeB::SIZE)?)
    }
}

/// Decode a payload for `type_id` with the given variable-structure
/// qualifier. Called through the registry.
pub(crate) fn decode(type_id: TypeId, data: &[u8], qualifier: u8) -> Result<Message> {
    let mut r = Reader::new(data, type_id);
    match type_id {
        TypeId::Authenticate => Ok(Message::Authenticate {
            password: r.u32_le()?,
        }),
        TypeId::FinishSession => Ok(Message::FinishSession),
        TypeId::ReadDateTime => Ok(Message::ReadDateTime),
        TypeId::DateTime => Ok(Message::DateTime(r.time_b()?)),
        TypeId::SetDateTime => Ok(Message::SetDateTime(r.time_b()?)),
        TypeId::ReadManufacturerId => Ok(Message::ReadManufacturerId),
        TypeId::ManufacturerId => {
            r.u8()?;
            Ok(Message::ManufacturerId(ManufacturerId {
                manufacturer: r.u8()?,
                equipment: r.u32_le()?,
            }))
        }
        TypeId::ReadAbsoluteTotals => Ok(Message::ReadAbsoluteTotals(decode_totals_request(&mut r)?)),
        TypeId::ReadIncrementalTotals => {
            Ok(Message::ReadIncrementalTotals(decode_totals_request(&mut r)?))
        }
        TypeId::AbsoluteTotals => Ok(Message::AbsoluteTotals(decode_totals_series(
            &mut r, qualifier,
        )?)),
        TypeId::IncrementalTotals => Ok(Message::IncrementalTotals(decode_totals_series(
            &mut r, qualifier,
        )?)),
        TypeId::ReadCurrentTariff => Ok(Message::ReadCurrentTariff),
        TypeId::ReadStoredTariff => Ok(Message::ReadStoredTariff {
            start: r.time_a()?,
            end: r.time_a()?,
        }),
        TypeId::CurrentTariff => Ok(Message::CurrentTariff(decode_billing(&mut r)?)),
        TypeId::StoredTariff => Ok(Message::StoredTariff(decode_billing(&mut r)?)),
        TypeId::ReadBlockTotals => Ok(Message::ReadBlockTotals {
            object: r.u8()?,
            start: r.time_a()?,
            end: r.time_a()?,
        }),
        TypeId::BlockTotals => decode_block_totals(&mut r, qualifier),
        TypeId::ReadConfiguration => Ok(Message::ReadConfiguration),
        TypeId::Configuration => Ok(Message::Configuration(MeterConfiguration {
            manufacturer: r.u8()?,
            equipment: r.u32_le()?,
            firmware_version: r.u8()?,
            integration_period: r.u8()?,
            battery_end: r.time_a()?,
            dst_enabled: r.u8()? != 0,
        })),
        TypeId::ReadContractedPowers => Ok(Message::ReadContractedPowers),
        TypeId::ContractedPowers => {
            let mut powers = Vec::with_capacity(usize::from(qualifier));
            for _ in 0..qualifier {
                powers.push(ContractedPower {
                    address: r.u8()?,
                    power: r.u32_le()?,
                });
            }
            Ok(Message::ContractedPowers {
                powers,
                timestamp: r.time_a()?,
            })
        }
        TypeId::ReadDaylightChangeDates => Ok(Message::ReadDaylightChangeDates),
        TypeId::DaylightChangeDates => Ok(Message::DaylightChangeDates {
            winter_to_summer: r.time_a()?,
            summer_to_winter: r.time_a()?,
        }),
        TypeId::ReadInstantValues => {
            let mut objects = Vec::with_capacity(usize::from(qualifier));
            for _ in 0..qualifier {
                let code = r.u8()?;
                objects.push(InstantObject::from_u8(code).ok_or_else(|| {
                    Iec102Error::malformed(format!("unknown instant-value object code {}", code))
                })?);
            }
            Ok(Message::ReadInstantValues { objects })
        }
        TypeId::InstantValues => decode_instant_values(&mut r, qualifier),
    }
}

fn decode_totals_request(r: &mut Reader<'_>) -> Result<TotalsRequest> {
    Ok(TotalsRequest {
        first: r.u8()?,
        last: r.u8()?,
        start: r.time_a()?,
        end: r.time_a()?,
    })
}

fn decode_totals_series(r: &mut Reader<'_>, qualifier: u8) -> Result<IntegratedTotalsSeries> {
    // qualifier 6-byte records, then the shared trailing period label
    let count = usize::from(qualifier);
    let end_of_period = TimeA::decode(
        r.data
            .get(count * 6..count * 6 + TimeA::SIZE)
            .ok_or(Iec102Error::PayloadTooShort {
                type_id: r.type_id.as_u8(),
                needed: count * 6 + TimeA::SIZE,
                got: r.data.len(),
            })?,
    )?;
    let mut totals = Vec::with_capacity(count);
    for _ in 0..count {
        totals.push(IntegratedTotal {
            address: r.u8()?,
            total: r.u32_le()?,
            quality: r.u8()?,
            timestamp: end_of_period,
        });
    }
    Ok(IntegratedTotalsSeries {
        totals,
        end_of_period,
    })
}

fn decode_billing(r: &mut Reader<'_>) -> Result<BillingRegister> {
    Ok(BillingRegister {
        address: r.u8()?,
        active_abs: r.u32_le()?,
        active_inc: r.u32_le()?,
        active_qual: r.u8()?,
        reactive_abs_ind: r.u32_le()?,
        reactive_inc_ind: r.u32_le()?,
        reactive_qual_ind: r.u8()?,
        reactive_abs_cap: r.u32_le()?,
        reactive_inc_cap: r.u32_le()?,
        reactive_qual_cap: r.u8()?,
        reserved_7: r.u32_le()?,
        reserved_7_qual: r.u8()?,
        reserved_8: r.u32_le()?,
        reserved_8_qual: r.u8()?,
        max_power: r.u32_le()?,
        max_power_date: r.time_a()?,
        max_power_qual: r.u8()?,
        excess_power: r.u32_le()?,
        excess_power_qual: r.u8()?,
        period_start: r.time_a()?,
        period_end: r.time_a()?,
    })
}

fn decode_block_totals(r: &mut Reader<'_>, qualifier: u8) -> Result<Message> {
    let mut groups = Vec::with_capacity(usize::from(qualifier));
    for _ in 0..qualifier {
        let object = r.u8()?;
        let count = block_object_count(object).ok_or_else(|| {
            Iec102Error::malformed(format!("unknown block-totals object address {}", object))
        })?;
        let timestamp = TimeA::decode(
            r.data
                .get(r.pos + count * 5..r.pos + count * 5 + TimeA::SIZE)
                .ok_or(Iec102Error::PayloadTooShort {
                    type_id: r.type_id.as_u8(),
                    needed: r.pos + count * 5 + TimeA::SIZE,
                    got: r.data.len(),
                })?,
        )?;
        let mut totals = Vec::with_capacity(count);
        for index in 1..=count {
            totals.push(IntegratedTotal {
                address: index as u8,
                total: r.u32_le()?,
                quality: r.u8()?,
                timestamp,
            });
        }
        r.take(TimeA::SIZE)?;
        groups.push(BlockTotalsGroup {
            object,
            totals,
            timestamp,
        });
    }
    Ok(Message::BlockTotals { groups })
}

fn decode_instant_values(r: &mut Reader<'_>, qualifier: u8) -> Result<Message> {
    let mut groups = Vec::with_capacity(usize::from(qualifier));
    for _ in 0..qualifier {
        let code = r.u8()?;
        let object = InstantObject::from_u8(code).ok_or_else(|| {
            Iec102Error::malformed(format!("unknown instant-value object code {}", code))
        })?;
        let mut values = Vec::with_capacity(object.value_count());
        for index in 1..=object.value_count() {
            values.push(InstantValue {
                index: index as u8,
                value: r.u32_le()?,
                quality: r.u8()?,
            });
        }
        groups.push(InstantValuesGroup { object, values });
    }
    let timestamp = r.time_b()?;
    Ok(Message::InstantValues { groups, timestamp })
}
