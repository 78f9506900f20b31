use serde::Serialize;

use crate::core::DateTime;
use crate::time::source::SourceTag;

/// Quality above which the radio counts as synchronizing
pub const SYNCHRONIZING_QUALITY: u8 = 80;

/// Radio reception state as shown on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RadioIndicator {
    /// Confirmed telegram within the radio timeout
    InSync,
    /// Not in sync, but the signal is good enough to get there
    Synchronizing,
    /// Not in sync and no usable signal
    NoSignal,
}

impl RadioIndicator {
    /// Derives the indicator from the radio in-sync flag and the signal quality
    pub fn from_state(in_sync: bool, quality: u8) -> Self {
        if in_sync {
            RadioIndicator::InSync
        } else if quality > SYNCHRONIZING_QUALITY {
            RadioIndicator::Synchronizing
        } else {
            RadioIndicator::NoSignal
        }
    }
}

/// Snapshot of the clock state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockStatus {
    /// Time to display
    pub datetime: DateTime,
    /// Whether the displayed time is trusted
    pub in_sync: bool,
    /// Source of the displayed time
    pub source: SourceTag,
    /// Radio reception
    pub radio: RadioIndicator,
    /// External RTC trusted
    pub external_rtc_in_sync: bool,
    /// Internal RTC trusted
    pub internal_rtc_in_sync: bool,
    /// Smoothed signal quality, 0..=100
    pub quality: u8,
    /// Consecutive agreeing telegrams
    pub confirm_count: u32,
}
