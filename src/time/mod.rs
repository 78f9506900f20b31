//! Time sources and timing primitives
//!
//! This module provides the pieces the clock core needs from the outside world:
//!
//! - Wrapping microsecond and second timestamp arithmetic
//! - Per-source reception records (radio, external RTC, internal RTC, final)
//! - Collaborator traits for the external and the internal RTC
//! - The external RTC request queue with exactly-once completions
//! - Simulated transmitter and RTCs for tests and demos
//!
//! # Examples
//!
//! ```
//! use dcf_clock::time::util::diff_us;
//!
//! // Differences survive timer wraparound
//! assert_eq!(diff_us(10, u32::MAX - 9), 20);
//! ```

pub mod rtc;
pub mod sim;
pub mod source;

pub use self::rtc::{
    BusStatus, ExternalRtc, InternalRtc, RequestOrigin, RtcCommand, RtcCompletion, RtcRequestQueue,
};
pub use self::sim::{Dcf77Transmitter, SimExternalRtc, SimInternalRtc, SimulatedSignal};
pub use self::source::{SourceTag, TimeSourceRecord, Timestamp};

/// Sampled inputs of one poll cycle
pub trait SignalInput {
    /// Free-running microsecond clock, wraps at `u32::MAX`
    fn now_us(&mut self) -> u32;

    /// Receiver output, true while the carrier is reduced
    fn radio_level(&mut self) -> bool;
}

/// Utility functions for wrapping timestamps
pub mod util {
    /// Microseconds between two readings of the wrapping microsecond clock
    ///
    /// The result is correct as long as the readings are less than about
    /// 35 minutes apart, in either order.
    pub fn diff_us(end: u32, start: u32) -> u32 {
        (end.wrapping_sub(start) as i32).unsigned_abs()
    }

    /// Seconds between two readings of the wrapping second counter
    pub fn diff_s(end: u32, start: u32) -> u32 {
        (end.wrapping_sub(start) as i32).unsigned_abs()
    }
}
