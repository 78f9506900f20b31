use serde::{Serialize, Deserialize};

use crate::core::DateTime;
use super::util::diff_s;

/// Time source types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceTag {
    /// Nothing received yet
    #[default]
    None,
    /// DCF77 radio telegram
    Radio,
    /// Battery-backed RTC chip on the bus
    ExternalRtc,
    /// Microcontroller RTC
    InternalRtc,
}

impl SourceTag {
    /// Short name for logs and the status output
    pub fn name(self) -> &'static str {
        match self {
            SourceTag::None => "none",
            SourceTag::Radio => "radio",
            SourceTag::ExternalRtc => "rtc",
            SourceTag::InternalRtc => "rtc-intern",
        }
    }
}

/// Reception time of a record on both system clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wrapping microsecond clock
    pub us: u32,
    /// Wrapping second counter
    pub s: u32,
}

/// Latest reading of one time source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TimeSourceRecord {
    datetime: DateTime,
    /// New value arrived in this cycle and was not processed yet
    received: bool,
    in_sync: bool,
    received_at: Timestamp,
    /// Source the value came from
    tag: SourceTag,
}

impl TimeSourceRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new reading and flags it as received
    ///
    /// The in-sync flag is left untouched.
    pub fn set_received(&mut self, datetime: &DateTime, tag: SourceTag, at: Timestamp) {
        self.assign(datetime, tag, at);
        self.received = true;
    }

    /// Stores a derived value without flagging a new reading
    pub fn assign(&mut self, datetime: &DateTime, tag: SourceTag, at: Timestamp) {
        self.datetime = *datetime;
        self.received_at = at;
        self.tag = tag;
    }

    /// Consumes the received flag
    pub fn take_received(&mut self) -> bool {
        std::mem::take(&mut self.received)
    }

    /// Whether a reading arrived that was not consumed yet
    pub fn is_received(&self) -> bool {
        self.received
    }

    /// True when the last reading is more than `timeout_s` seconds old
    pub fn is_stale(&self, now_s: u32, timeout_s: u32) -> bool {
        diff_s(now_s, self.received_at.s) > timeout_s
    }

    /// Last reading
    pub fn datetime(&self) -> &DateTime {
        &self.datetime
    }

    /// Whether the source is currently trusted
    pub fn in_sync(&self) -> bool {
        self.in_sync
    }

    /// Marks the source trusted or not
    pub fn set_in_sync(&mut self, in_sync: bool) {
        self.in_sync = in_sync;
    }

    /// When the last reading arrived
    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    /// Origin of the last reading
    pub fn tag(&self) -> SourceTag {
        self.tag
    }

    /// True when the values of both records are more than `max_secs` apart or on different dates
    pub fn differs_from(&self, other: &TimeSourceRecord, max_secs: i32) -> bool {
        self.datetime.differs_from(&other.datetime, max_secs)
    }
}
