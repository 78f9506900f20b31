use crate::core::{DateTime, DecodeError};
use super::frame::BitSlots;
use super::pulse::BitValue;
use super::FRAME_SLOTS;

/// Frame positions of the DCF77 minute telegram
pub mod layout {
    /// Start of minute, always 0
    pub const MINUTE_MARK: usize = 0;
    /// Start of encoded time, always 1
    pub const TIME_START: usize = 20;
    /// Minute BCD bits
    pub const MINUTE: (usize, usize) = (21, 27);
    /// Minute parity
    pub const MINUTE_PARITY: usize = 28;
    /// Hour BCD bits
    pub const HOUR: (usize, usize) = (29, 34);
    /// Hour parity
    pub const HOUR_PARITY: usize = 35;
    /// Day of month BCD bits
    pub const DAY: (usize, usize) = (36, 41);
    /// Day of week bits, Monday = 1 .. Sunday = 7
    pub const WEEKDAY: (usize, usize) = (42, 44);
    /// Month BCD bits
    pub const MONTH: (usize, usize) = (45, 49);
    /// Two-digit year BCD bits
    pub const YEAR: (usize, usize) = (50, 57);
    /// Parity over day, weekday, month and year
    pub const DATE_PARITY: usize = 58;
    /// CET indicator
    pub const CET: usize = 18;
}

/// Decoded time-of-day fields of a telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelegramTime {
    /// Hour, 0..=23
    pub hour: u8,
    /// Minute, 0..=59
    pub minute: u8,
}

/// Decoded date fields of a telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelegramDate {
    /// Full year
    pub year: u16,
    /// Month, 1..=12
    pub month: u8,
    /// Day of month, 1..=31
    pub day: u8,
    /// Day of week, 0 = Sunday
    pub weekday: u8,
}

/// Converts between received bit slots and date/time values
#[derive(Debug, Clone, Copy, Default)]
pub struct TelegramCodec;

impl TelegramCodec {
    /// Creates a new telegram codec
    pub fn new() -> Self {
        TelegramCodec
    }

    /// Checks the fixed marker bits 0 and 20
    pub fn check_markers(&self, slots: &BitSlots) -> Result<(), DecodeError> {
        if slots.value(layout::MINUTE_MARK) != BitValue::Zero {
            return Err(DecodeError::Marker { index: layout::MINUTE_MARK });
        }
        if slots.value(layout::TIME_START) != BitValue::One {
            return Err(DecodeError::Marker { index: layout::TIME_START });
        }
        Ok(())
    }

    /// Decodes hour and minute with their parity bits
    pub fn decode_time(&self, slots: &BitSlots) -> Result<TelegramTime, DecodeError> {
        let minute = self.decode_parity_field(slots, layout::MINUTE, layout::MINUTE_PARITY, "minute")?;
        let hour = self.decode_parity_field(slots, layout::HOUR, layout::HOUR_PARITY, "hour")?;

        let time = TelegramTime {
            hour: bcd_to_u8(hour).ok_or(DecodeError::Bcd { field: "hour" })?,
            minute: bcd_to_u8(minute).ok_or(DecodeError::Bcd { field: "minute" })?,
        };
        if time.hour > 23 || time.minute > 59 {
            return Err(DecodeError::OutOfRange { field: "time" });
        }
        Ok(time)
    }

    /// Decodes day, weekday, month and year with the shared date parity
    pub fn decode_date(&self, slots: &BitSlots) -> Result<TelegramDate, DecodeError> {
        let parity = defined(slots, layout::DATE_PARITY, "date parity")?;

        let day = extract(slots, layout::DAY, "day")?;
        let weekday = extract(slots, layout::WEEKDAY, "weekday")?;
        let month = extract(slots, layout::MONTH, "month")?;
        let year = extract(slots, layout::YEAR, "year")?;

        let ones = day.count_ones() + weekday.count_ones() + month.count_ones() + year.count_ones();
        if !parity_matches(ones, parity) {
            return Err(DecodeError::Parity { field: "date" });
        }

        let weekday = match bcd_to_u8(weekday).ok_or(DecodeError::Bcd { field: "weekday" })? {
            7 => 0,
            d => d,
        };
        let date = TelegramDate {
            year: 2000 + bcd_to_u8(year).ok_or(DecodeError::Bcd { field: "year" })? as u16,
            month: bcd_to_u8(month).ok_or(DecodeError::Bcd { field: "month" })?,
            day: bcd_to_u8(day).ok_or(DecodeError::Bcd { field: "day" })?,
            weekday,
        };

        let check = DateTime {
            year: date.year,
            month: date.month,
            day: date.day,
            weekday: date.weekday,
            ..DateTime::default()
        };
        if !check.is_valid_date() {
            return Err(DecodeError::OutOfRange { field: "date" });
        }
        Ok(date)
    }

    /// Decodes a whole telegram
    pub fn decode(&self, slots: &BitSlots) -> Result<DateTime, DecodeError> {
        self.check_markers(slots)?;
        let time = self.decode_time(slots)?;
        let date = self.decode_date(slots)?;
        Ok(combine(time, date))
    }

    /// Encodes the telegram announcing `dt` (seconds are not transmitted)
    ///
    /// Slot 59 stays undefined: no pulse is sent in the last second.
    pub fn encode(&self, dt: &DateTime) -> [BitValue; FRAME_SLOTS] {
        let mut bits = [BitValue::Zero; FRAME_SLOTS];
        bits[FRAME_SLOTS - 1] = BitValue::Undefined;
        bits[layout::CET] = BitValue::One;
        bits[layout::TIME_START] = BitValue::One;

        let weekday = if dt.weekday == 0 { 7 } else { dt.weekday };
        let minute = u8_to_bcd(dt.minute);
        let hour = u8_to_bcd(dt.hour);
        let day = u8_to_bcd(dt.day);
        let month = u8_to_bcd(dt.month);
        let year = u8_to_bcd((dt.year % 100) as u8);

        put(&mut bits, layout::MINUTE, minute);
        bits[layout::MINUTE_PARITY] = parity_bit(minute.count_ones());
        put(&mut bits, layout::HOUR, hour);
        bits[layout::HOUR_PARITY] = parity_bit(hour.count_ones());
        put(&mut bits, layout::DAY, day);
        put(&mut bits, layout::WEEKDAY, weekday);
        put(&mut bits, layout::MONTH, month);
        put(&mut bits, layout::YEAR, year);
        bits[layout::DATE_PARITY] = parity_bit(
            day.count_ones() + weekday.count_ones() + month.count_ones() + year.count_ones(),
        );
        bits
    }

    fn decode_parity_field(
        &self,
        slots: &BitSlots,
        range: (usize, usize),
        parity_idx: usize,
        field: &'static str,
    ) -> Result<u8, DecodeError> {
        let parity = defined(slots, parity_idx, field)?;
        let val = extract(slots, range, field)?;
        if !parity_matches(val.count_ones(), parity) {
            return Err(DecodeError::Parity { field });
        }
        Ok(val)
    }
}

/// Merges decoded time and date fields; seconds are zero at the minute mark
pub fn combine(time: TelegramTime, date: TelegramDate) -> DateTime {
    DateTime {
        year: date.year,
        month: date.month,
        day: date.day,
        weekday: date.weekday,
        hour: time.hour,
        minute: time.minute,
        second: 0,
    }
}

/// Converts a packed BCD byte, `None` for nibbles above 9
pub fn bcd_to_u8(bcd: u8) -> Option<u8> {
    let low = bcd & 0x0F;
    let high = bcd >> 4;
    if low > 9 || high > 9 {
        return None;
    }
    Some(high * 10 + low)
}

/// Converts a value below 100 to packed BCD
pub fn u8_to_bcd(val: u8) -> u8 {
    ((val / 10) << 4) | (val % 10)
}

fn defined(slots: &BitSlots, idx: usize, field: &'static str) -> Result<BitValue, DecodeError> {
    match slots.value(idx) {
        BitValue::Undefined => Err(DecodeError::UndefinedBit { field, index: idx }),
        value => Ok(value),
    }
}

/// Collects slots `first..=last` into a byte, first slot is the least significant bit
fn extract(slots: &BitSlots, (first, last): (usize, usize), field: &'static str) -> Result<u8, DecodeError> {
    let mut val = 0u8;
    for (bit, idx) in (first..=last).enumerate() {
        if defined(slots, idx, field)? == BitValue::One {
            val |= 1 << bit;
        }
    }
    Ok(val)
}

fn put(bits: &mut [BitValue; FRAME_SLOTS], (first, last): (usize, usize), val: u8) {
    for (bit, idx) in (first..=last).enumerate() {
        bits[idx] = if val & (1 << bit) != 0 { BitValue::One } else { BitValue::Zero };
    }
}

/// Even parity: the parity bit is one when the data holds an odd number of ones
fn parity_matches(ones: u32, parity: BitValue) -> bool {
    parity == parity_bit(ones)
}

fn parity_bit(ones: u32) -> BitValue {
    if ones % 2 == 1 {
        BitValue::One
    } else {
        BitValue::Zero
    }
}
