use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Serialize, Deserialize};

use super::error::{Error, Result};

/// Calendar date and time-of-day as exchanged between the time sources
///
/// Field ranges follow the RTC hardware conventions: year 0..=4095,
/// weekday 0..=6 with 0 meaning Sunday. Validation is per field only, so a
/// value like 31 February passes [`DateTime::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateTime {
    /// Year, 0..=4095
    pub year: u16,
    /// Month, 1..=12
    pub month: u8,
    /// Day of month, 1..=31
    pub day: u8,
    /// Day of week, 0..=6 (0 is Sunday)
    pub weekday: u8,
    /// Hour, 0..=23
    pub hour: u8,
    /// Minute, 0..=59
    pub minute: u8,
    /// Second, 0..=59
    pub second: u8,
}

impl Default for DateTime {
    /// 00:00:00 01.01.2000
    fn default() -> Self {
        DateTime {
            year: 2000,
            month: 1,
            day: 1,
            weekday: 0,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTime {
    /// Creates a calendar-checked date/time; the weekday is derived from the date
    pub fn from_ymd_hms(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .ok_or_else(|| Error::invalid_input(format!("no such date: {}.{}.{}", day, month, year)))?;
        let time = NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)
            .ok_or_else(|| Error::invalid_input(format!("no such time: {}:{}:{}", hour, minute, second)))?;
        let dt = DateTime::from_naive(&NaiveDateTime::new(date, time));
        if !dt.is_valid() {
            return Err(Error::invalid_input(format!("date/time out of range: {}", dt)));
        }
        Ok(dt)
    }

    /// Converts from a chrono value
    pub fn from_naive(naive: &NaiveDateTime) -> Self {
        DateTime {
            year: naive.year().clamp(0, u16::MAX as i32) as u16,
            month: naive.month() as u8,
            day: naive.day() as u8,
            weekday: naive.weekday().num_days_from_sunday() as u8,
            hour: naive.hour() as u8,
            minute: naive.minute() as u8,
            second: naive.second() as u8,
        }
    }

    /// Converts to a chrono value, `None` if the fields do not form a real calendar date
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?;
        let time = NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)?;
        Some(NaiveDateTime::new(date, time))
    }

    /// Adds (or subtracts) seconds with full calendar roll-over
    pub fn add_seconds(&self, secs: i64) -> Option<Self> {
        let naive = self.to_naive()?;
        let shifted = naive.checked_add_signed(chrono::Duration::seconds(secs))?;
        let dt = DateTime::from_naive(&shifted);
        dt.is_valid().then_some(dt)
    }

    /// Checks hour, minute and second ranges
    pub fn is_valid_time(&self) -> bool {
        self.hour <= 23 && self.minute <= 59 && self.second <= 59
    }

    /// Checks day, month, year and weekday ranges
    pub fn is_valid_date(&self) -> bool {
        (1..=31).contains(&self.day)
            && (1..=12).contains(&self.month)
            && self.year <= 4095
            && self.weekday <= 6
    }

    /// Checks both time and date ranges
    pub fn is_valid(&self) -> bool {
        self.is_valid_time() && self.is_valid_date()
    }

    /// Time of day in seconds
    pub fn seconds_of_day(&self) -> i32 {
        self.hour as i32 * 3600 + self.minute as i32 * 60 + self.second as i32
    }

    /// Signed time-of-day difference `self - other` in seconds, ignoring the date
    pub fn time_diff(&self, other: &DateTime) -> i32 {
        self.seconds_of_day() - other.seconds_of_day()
    }

    /// Compares only year, month and day
    pub fn date_cmp(&self, other: &DateTime) -> Ordering {
        (self.year, self.month, self.day).cmp(&(other.year, other.month, other.day))
    }

    /// True when the dates differ or the times of day are more than `max_secs` apart
    pub fn differs_from(&self, other: &DateTime, max_secs: i32) -> bool {
        self.time_diff(other).abs() > max_secs || self.date_cmp(other) != Ordering::Equal
    }

    /// Parses operator input: time as `hh:mm:ss`, date as `DD.MM.YYYY`
    ///
    /// The weekday is derived from the calendar, so the date must exist.
    pub fn parse(time: &str, date: &str) -> Result<Self> {
        let [hour, minute, second] = parse_fields(time, ':', "time")?;
        let [day, month, year] = parse_fields(date, '.', "date")?;

        if hour > 23 || minute > 59 || second > 59 {
            return Err(Error::invalid_input(format!("time out of range: {}", time)));
        }
        if !(1..=31).contains(&day) || !(1..=12).contains(&month) || year > 4095 {
            return Err(Error::invalid_input(format!("date out of range: {}", date)));
        }

        DateTime::from_ymd_hms(year as u16, month as u8, day as u8, hour as u8, minute as u8, second as u8)
    }
}

fn parse_fields(text: &str, sep: char, what: &str) -> Result<[u32; 3]> {
    let mut out = [0u32; 3];
    let mut parts = text.trim().split(sep);
    for slot in out.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| Error::invalid_input(format!("incomplete {}: {}", what, text)))?;
        *slot = part
            .parse::<u32>()
            .map_err(|_| Error::invalid_input(format!("invalid {}: {}", what, text)))?;
    }
    if parts.next().is_some() {
        return Err(Error::invalid_input(format!("trailing fields in {}: {}", what, text)));
    }
    Ok(out)
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02} {:02}.{:02}.{:04} ({})",
            self.hour, self.minute, self.second, self.day, self.month, self.year, self.weekday
        )
    }
}

/// Pulse width bands used to classify DCF77 pulses (microseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseTimings {
    /// Lower bound (exclusive) of a zero-bit
    pub bit0_min_us: u32,
    /// Upper bound (exclusive) of a zero-bit
    pub bit0_max_us: u32,
    /// Lower bound (inclusive) of a one-bit
    pub bit1_min_us: u32,
    /// Upper bound (exclusive) of a one-bit; longer pulses invalidate the sync
    pub bit1_max_us: u32,
    /// Minimum gap between a falling and the next rising edge that marks a new minute
    pub sync_min_us: u32,
}

impl Default for PulseTimings {
    fn default() -> Self {
        PulseTimings {
            bit0_min_us: 50_000,
            bit0_max_us: 175_000,
            bit1_min_us: 175_001,
            bit1_max_us: 350_000,
            sync_min_us: 1_500_000,
        }
    }
}

/// Configuration for the clock core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// DCF77 pulse classification
    pub pulse: PulseTimings,
    /// Consecutive valid telegrams required before the radio time is trusted
    pub confirm_threshold: u32,
    /// Allowed difference between sources before a correction is written
    pub max_drift_secs: i32,
    /// Radio stays in sync this long without a confirmed telegram
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub radio_sync_timeout: Duration,
    /// RTC, internal RTC and final value fall out of sync after this silence
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub source_timeout: Duration,
    /// Periodic external RTC read interval
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub rtc_read_interval: Duration,
    /// Poll loop period when driven by [`crate::sync::ClockManager::run`]
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub poll_interval: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            pulse: PulseTimings::default(),
            confirm_threshold: super::CONFIRM_THRESHOLD,
            max_drift_secs: 1,
            // Reception fades daily, keep trusting the radio for 12 hours
            radio_sync_timeout: Duration::from_secs(12 * 3600),
            source_timeout: Duration::from_secs(1),
            rtc_read_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl ClockConfig {
    /// Validates the configuration
    ///
    /// Checks that:
    /// - pulse bands are ordered and do not overlap
    /// - the sync gap is longer than any bit
    /// - thresholds and intervals are non-zero
    pub fn validate(&self) -> Result<()> {
        let p = &self.pulse;
        if !(p.bit0_min_us < p.bit0_max_us && p.bit0_max_us < p.bit1_min_us && p.bit1_min_us < p.bit1_max_us) {
            return Err(Error::config("Pulse bands must be ordered and non-overlapping"));
        }
        if p.sync_min_us <= p.bit1_max_us {
            return Err(Error::config("Sync gap must be longer than a one-bit"));
        }
        if self.confirm_threshold == 0 {
            return Err(Error::config("Confirmation threshold must be at least 1"));
        }
        if self.max_drift_secs < 0 {
            return Err(Error::config("Allowed drift cannot be negative"));
        }
        if self.source_timeout < Duration::from_secs(1) {
            return Err(Error::config("Source timeout below the 1 s sweep resolution"));
        }
        if self.radio_sync_timeout < self.source_timeout {
            return Err(Error::config("Radio timeout shorter than source timeout"));
        }
        if self.rtc_read_interval.is_zero() || self.rtc_read_interval.as_micros() > u32::MAX as u128 / 2 {
            return Err(Error::config("RTC read interval out of range"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::config("Poll interval must be non-zero"));
        }
        Ok(())
    }

    /// Radio staleness window in whole seconds
    pub fn radio_sync_timeout_secs(&self) -> u32 {
        self.radio_sync_timeout.as_secs().min(u32::MAX as u64) as u32
    }

    /// Source staleness window in whole seconds
    pub fn source_timeout_secs(&self) -> u32 {
        self.source_timeout.as_secs().min(u32::MAX as u64) as u32
    }

    /// External RTC read interval in microseconds
    pub fn rtc_read_interval_us(&self) -> u32 {
        self.rtc_read_interval.as_micros().min(u32::MAX as u128) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_datetime() {
        let dt = DateTime::default();
        assert!(dt.is_valid());
        assert_eq!(dt.to_string(), "00:00:00 01.01.2000 (0)");
    }

    #[test]
    fn test_weekday_from_calendar() {
        // 18 October 2026 is a Sunday
        let dt = DateTime::from_ymd_hms(2026, 10, 18, 12, 30, 0).unwrap();
        assert_eq!(dt.weekday, 0);
        let dt = DateTime::from_ymd_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(dt.weekday, 4);
        assert!(DateTime::from_ymd_hms(2023, 2, 29, 0, 0, 0).is_err());
    }

    #[test]
    fn test_range_checks_ignore_month_length() {
        let dt = DateTime {
            day: 31,
            month: 2,
            ..DateTime::default()
        };
        assert!(dt.is_valid());
        assert!(dt.to_naive().is_none());

        let dt = DateTime {
            hour: 24,
            ..DateTime::default()
        };
        assert!(!dt.is_valid_time());
        assert!(dt.is_valid_date());
    }

    #[test]
    fn test_differs_from() {
        let a = DateTime::from_ymd_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert!(!a.differs_from(&a.add_seconds(1).unwrap(), 1));
        assert!(a.differs_from(&a.add_seconds(2).unwrap(), 1));
        assert!(a.differs_from(&a.add_seconds(-2).unwrap(), 1));

        let next_day = DateTime { day: 2, ..a };
        assert!(next_day.differs_from(&a, 1));
        assert_eq!(next_day.time_diff(&a), 0);
    }

    #[test]
    fn test_add_seconds_rolls_over() {
        let dt = DateTime::from_ymd_hms(2024, 12, 31, 23, 59, 30).unwrap();
        let next = dt.add_seconds(45).unwrap();
        assert_eq!((next.year, next.month, next.day), (2025, 1, 1));
        assert_eq!((next.hour, next.minute, next.second), (0, 0, 15));
        assert_eq!(next.weekday, 3);
    }

    #[test]
    fn test_parse_operator_input() {
        let dt = DateTime::parse("07:05:09", "15.08.2025").unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second), (7, 5, 9));
        assert_eq!((dt.day, dt.month, dt.year), (15, 8, 2025));
        assert_eq!(dt.weekday, 5);

        assert!(DateTime::parse("24:00:00", "15.08.2025").is_err());
        assert!(DateTime::parse("12:00", "15.08.2025").is_err());
        assert!(DateTime::parse("12:00:00", "15.13.2025").is_err());
        assert!(DateTime::parse("12:00:00", "15.08.2025.1").is_err());
        assert!(DateTime::parse("12:00:00", "31.02.2025").is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ClockConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.radio_sync_timeout_secs(), 43_200);
        assert_eq!(config.source_timeout_secs(), 1);
        assert_eq!(config.rtc_read_interval_us(), 100_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClockConfig::default();
        config.pulse.bit1_min_us = 170_000;
        assert!(config.validate().is_err());

        let config = ClockConfig {
            confirm_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClockConfig {
            source_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: ClockConfig = serde_json::from_str(
            r#"{"confirm_threshold": 2, "radio_sync_timeout": 3600.0}"#,
        )
        .unwrap();
        assert_eq!(config.confirm_threshold, 2);
        assert_eq!(config.radio_sync_timeout, Duration::from_secs(3600));
        assert_eq!(config.pulse, PulseTimings::default());
        assert!(config.validate().is_ok());

        let json = serde_json::to_string(&config).unwrap();
        let back: ClockConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
