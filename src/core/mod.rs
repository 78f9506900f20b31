//! Core types shared by the decoder and the arbiter
//!
//! This module contains the date/time value, the configuration and the error types.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{DecodeError, Error, Result};
pub use self::types::{ClockConfig, DateTime, PulseTimings};

/// Consecutive valid telegrams before the radio time is considered confirmed
pub const CONFIRM_THRESHOLD: u32 = 3;

/// Microseconds per second
pub const US_PER_SEC: u32 = 1_000_000;
