//! Bit-packed time labels.
//!
//! Payloads carry calendar instants in two compact forms: the 5-byte
//! type-A label (minute resolution) and the 7-byte type-B label (adds
//! seconds and milliseconds). Fields are packed as consecutive bit runs
//! starting at the least-significant bit of the first byte — equivalently,
//! the byte sequence read as a little-endian integer with fields extracted
//! from the low bits upward. This order is fixed by deployed meter
//! firmware; the round-trip tests below are the source of truth for it.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use crate::error::{Iec102Error, Result};

/// 5-byte time label (type A): minute resolution.
///
/// Decoded labels preserve every wire bit (including the reserved runs and
/// the day-of-week the meter sent) so that `encode(decode(bytes)) == bytes`
/// holds byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeA {
    /// Minute (0-59)
    pub minute: u8,
    /// Tariff-information-switch flag (TIS)
    pub tariff_switch: bool,
    /// Invalid flag (IV)
    pub invalid: bool,
    /// Hour (0-23)
    pub hour: u8,
    /// Reserved run RES1 (2 bits)
    pub reserved1: u8,
    /// Daylight-saving flag (SU): true during summer time
    pub summer_time: bool,
    /// Day of month (1-31)
    pub day: u8,
    /// Day of week (1 = Monday .. 7 = Sunday)
    pub weekday: u8,
    /// Month (1-12)
    pub month: u8,
    /// Energy tariff information (ETI, 2 bits)
    pub energy_tariff: u8,
    /// Power tariff information (PTI, 2 bits)
    pub power_tariff: u8,
    /// Year offset from 2000 (0-99)
    pub year: u8,
    /// Reserved bit RES2
    pub reserved2: bool,
}

/// 7-byte time label (type B): adds seconds and milliseconds ahead of the
/// type-A fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeB {
    /// Milliseconds (0-999)
    pub milliseconds: u16,
    /// Seconds (0-59)
    pub seconds: u8,
    /// The calendar fields shared with the 5-byte form
    pub label: TimeA,
}

/// Read `width` bits of `value` starting at bit `offset`.
#[inline]
fn bits(value: u64, offset: u32, width: u32) -> u64 {
    (value >> offset) & ((1u64 << width) - 1)
}

/// Accumulate up to 8 bytes as a little-endian integer.
#[inline]
fn le_accumulate(data: &[u8]) -> u64 {
    data.iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

impl TimeA {
    /// Encoded size in bytes.
    pub const SIZE: usize = 5;

    /// Build a label from a calendar instant.
    ///
    /// The daylight flag and tariff bits start cleared; set them explicitly
    /// when the meter context requires it.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self {
            minute: dt.minute() as u8,
            hour: dt.hour() as u8,
            day: dt.day() as u8,
            weekday: dt.weekday().number_from_monday() as u8,
            month: dt.month() as u8,
            year: (dt.year() % 100) as u8,
            ..Default::default()
        }
    }

    /// Decode a 5-byte label.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Iec102Error::malformed(format!(
                "time label A needs {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }
        Ok(Self::from_fields(le_accumulate(&data[..Self::SIZE]), 0))
    }

    /// Encode to the 5-byte wire form.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let value = self.to_fields(0);
        let mut out = [0u8; Self::SIZE];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = (value >> (8 * i)) as u8;
        }
        out
    }

    /// Extract the shared calendar fields from `value`, starting at bit
    /// `offset` (0 for type A, 16 for type B).
    fn from_fields(value: u64, offset: u32) -> Self {
        Self {
            minute: bits(value, offset, 6) as u8,
            tariff_switch: bits(value, offset + 6, 1) != 0,
            invalid: bits(value, offset + 7, 1) != 0,
            hour: bits(value, offset + 8, 5) as u8,
            reserved1: bits(value, offset + 13, 2) as u8,
            summer_time: bits(value, offset + 15, 1) != 0,
            day: bits(value, offset + 16, 5) as u8,
            weekday: bits(value, offset + 21, 3) as u8,
            month: bits(value, offset + 24, 4) as u8,
            energy_tariff: bits(value, offset + 28, 2) as u8,
            power_tariff: bits(value, offset + 30, 2) as u8,
            year: bits(value, offset + 32, 7) as u8,
            reserved2: bits(value, offset + 39, 1) != 0,
        }
    }

    /// Pack the shared calendar fields into an integer, starting at bit
    /// `offset`.
    fn to_fields(&self, offset: u32) -> u64 {
        let mut value = 0u64;
        value |= u64::from(self.minute & 0x3F) << offset;
        value |= u64::from(self.tariff_switch) << (offset + 6);
        value |= u64::from(self.invalid) << (offset + 7);
        value |= u64::from(self.hour & 0x1F) << (offset + 8);
        value |= u64::from(self.reserved1 & 0x03) << (offset + 13);
        value |= u64::from(self.summer_time) << (offset + 15);
        value |= u64::from(self.day & 0x1F) << (offset + 16);
        value |= u64::from(self.weekday & 0x07) << (offset + 21);
        value |= u64::from(self.month & 0x0F) << (offset + 24);
        value |= u64::from(self.energy_tariff & 0x03) << (offset + 28);
        value |= u64::from(self.power_tariff & 0x03) << (offset + 30);
        value |= u64::from(self.year & 0x7F) << (offset + 32);
        value |= u64::from(self.reserved2) << (offset + 39);
        value
    }

    /// Convert to a naive calendar instant.
    ///
    /// A day or month of zero (all-zero or garbage payloads) is read as 1,
    /// so the all-zero label yields 2000-01-01 00:00 instead of failing.
    pub fn to_naive(&self) -> Result<NaiveDateTime> {
        naive_from_parts(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            0,
            0,
        )
    }

    /// Convert to a zone-aware instant.
    ///
    /// `standard_offset_hours` is the zone's standard-time UTC offset; one
    /// hour is added while the daylight-saving flag is set.
    pub fn to_datetime_with_offset(
        &self,
        standard_offset_hours: i32,
    ) -> Result<DateTime<FixedOffset>> {
        zoned_from_naive(self.to_naive()?, standard_offset_hours, self.summer_time)
    }
}

impl TimeB {
    /// Encoded size in bytes.
    pub const SIZE: usize = 7;

    /// Build a label from a calendar instant.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self {
            milliseconds: (dt.and_utc().timestamp_subsec_millis() % 1000) as u16,
            seconds: dt.second() as u8,
            label: TimeA::from_datetime(dt),
        }
    }

    /// Decode a 7-byte label.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Iec102Error::malformed(format!(
                "time label B needs {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }
        let value = le_accumulate(&data[..Self::SIZE]);
        Ok(Self {
            milliseconds: bits(value, 0, 10) as u16,
            seconds: bits(value, 10, 6) as u8,
            label: TimeA::from_fields(value, 16),
        })
    }

    /// Encode to the 7-byte wire form.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut value = self.label.to_fields(16);
        value |= u64::from(self.milliseconds & 0x3FF);
        value |= u64::from(self.seconds & 0x3F) << 10;
        let mut out = [0u8; Self::SIZE];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = (value >> (8 * i)) as u8;
        }
        out
    }

    /// Convert to a naive calendar instant.
    pub fn to_naive(&self) -> Result<NaiveDateTime> {
        naive_from_parts(
            self.label.year,
            self.label.month,
            self.label.day,
            self.label.hour,
            self.label.minute,
            self.seconds,
            self.milliseconds,
        )
    }

    /// Convert to a zone-aware instant; see [`TimeA::to_datetime_with_offset`].
    pub fn to_datetime_with_offset(
        &self,
        standard_offset_hours: i32,
    ) -> Result<DateTime<FixedOffset>> {
        zoned_from_naive(
            self.to_naive()?,
            standard_offset_hours,
            self.label.summer_time,
        )
    }
}

fn naive_from_parts(
    year: u8,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    seconds: u8,
    milliseconds: u16,
) -> Result<NaiveDateTime> {
    // Zero day/month appear in all-zero or garbage labels; read them as 1.
    let date = NaiveDate::from_ymd_opt(
        2000 + i32::from(year),
        u32::from(month.max(1)),
        u32::from(day.max(1)),
    )
    .ok_or_else(|| {
        Iec102Error::malformed(format!("invalid date in time label: {}-{}-{}", year, month, day))
    })?;
    date.and_hms_milli_opt(
        u32::from(hour),
        u32::from(minute),
        u32::from(seconds),
        u32::from(milliseconds),
    )
    .ok_or_else(|| {
        Iec102Error::malformed(format!(
            "invalid time in time label: {}:{}:{}",
            hour, minute, seconds
        ))
    })
}

fn zoned_from_naive(
    naive: NaiveDateTime,
    standard_offset_hours: i32,
    summer_time: bool,
) -> Result<DateTime<FixedOffset>> {
    let hours = standard_offset_hours + i32::from(summer_time);
    let offset = FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| Iec102Error::malformed(format!("invalid UTC offset: {}h", hours)))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| Iec102Error::malformed("ambiguous local time".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_time_a_decode_golden() {
        // 2009-09-18 00:01 (minute 1, day 18, month 9, year 9)
        let t = TimeA::decode(&[0x01, 0x00, 0x12, 0x09, 0x09]).unwrap();
        assert_eq!(t.minute, 1);
        assert_eq!(t.hour, 0);
        assert_eq!(t.day, 18);
        assert_eq!(t.month, 9);
        assert_eq!(t.year, 9);
        assert_eq!(
            t.to_naive().unwrap(),
            NaiveDate::from_ymd_opt(2009, 9, 18)
                .unwrap()
                .and_hms_opt(0, 1, 0)
                .unwrap()
        );

        // 2010-02-07 11:00
        let t = TimeA::decode(&[0x00, 0x0b, 0x07, 0x02, 0x0a]).unwrap();
        assert_eq!(
            t.to_naive().unwrap(),
            NaiveDate::from_ymd_opt(2010, 2, 7)
                .unwrap()
                .and_hms_opt(11, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_time_a_byte_roundtrip_golden() {
        for raw in [
            [0x01u8, 0x00, 0x12, 0x09, 0x09],
            [0x00, 0x0b, 0x07, 0x02, 0x0a],
        ] {
            let decoded = TimeA::decode(&raw).unwrap();
            assert_eq!(decoded.encode(), raw);
        }
    }

    #[test]
    fn test_time_a_from_datetime_roundtrip() {
        let dt = NaiveDate::from_ymd_opt(2017, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 0)
            .unwrap();
        let label = TimeA::from_datetime(dt);
        assert_eq!(label.weekday, 1); // 2017-01-02 is a Monday

        let back = TimeA::decode(&label.encode()).unwrap();
        assert_eq!(back, label);
        assert_eq!(back.to_naive().unwrap(), dt);
    }

    #[test]
    fn test_time_a_all_zero_defaults() {
        let t = TimeA::decode(&[0, 0, 0, 0, 0]).unwrap();
        assert_eq!(
            t.to_naive().unwrap(),
            NaiveDate::from_ymd_opt(2000, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_time_a_garbage_month_rejected() {
        // month bits 0b1111 = 15: not a calendar date
        let mut t = TimeA::from_datetime(
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        t.month = 15;
        assert!(t.to_naive().is_err());
    }

    #[test]
    fn test_time_a_too_short() {
        assert!(TimeA::decode(&[0x01, 0x00, 0x12]).is_err());
        assert!(TimeB::decode(&[0x01, 0x00, 0x12, 0x09, 0x09]).is_err());
    }

    #[test]
    fn test_time_b_roundtrip() {
        let dt = NaiveDate::from_ymd_opt(2023, 6, 15)
            .unwrap()
            .and_hms_milli_opt(13, 37, 42, 250)
            .unwrap();
        let label = TimeB::from_datetime(dt);
        let raw = label.encode();
        let back = TimeB::decode(&raw).unwrap();
        assert_eq!(back, label);
        assert_eq!(back.milliseconds, 250);
        assert_eq!(back.seconds, 42);
        assert_eq!(back.to_naive().unwrap(), dt);
    }

    #[test]
    fn test_summer_time_offset() {
        let mut t = TimeA::from_datetime(
            NaiveDate::from_ymd_opt(2021, 7, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );
        t.summer_time = true;
        let zoned = t.to_datetime_with_offset(1).unwrap();
        assert_eq!(zoned.offset().local_minus_utc(), 2 * 3600);

        t.summer_time = false;
        let zoned = t.to_datetime_with_offset(1).unwrap();
        assert_eq!(zoned.offset().local_minus_utc(), 3600);
    }

    proptest! {
        #[test]
        fn prop_time_a_field_roundtrip(
            minute in 0u8..60,
            hour in 0u8..24,
            day in 1u8..32,
            weekday in 1u8..8,
            month in 1u8..13,
            year in 0u8..100,
            summer_time in any::<bool>(),
            tariff_switch in any::<bool>(),
            invalid in any::<bool>(),
            energy_tariff in 0u8..4,
            power_tariff in 0u8..4,
        ) {
            let label = TimeA {
                minute, hour, day, weekday, month, year,
                summer_time, tariff_switch, invalid,
                energy_tariff, power_tariff,
                reserved1: 0, reserved2: false,
            };
            let back = TimeA::decode(&label.encode()).unwrap();
            prop_assert_eq!(back, label);
        }

        #[test]
        fn prop_time_a_byte_roundtrip(raw in proptest::array::uniform5(any::<u8>())) {
            let decoded = TimeA::decode(&raw).unwrap();
            prop_assert_eq!(decoded.encode(), raw);
        }

        #[test]
        fn prop_time_b_byte_roundtrip(raw in proptest::array::uniform7(any::<u8>())) {
            let decoded = TimeB::decode(&raw).unwrap();
            prop_assert_eq!(decoded.encode(), raw);
        }
    }
}
