//! DCF77 radio clock core
//!
//! This library decodes the DCF77 long-wave time signal from a sampled
//! receiver level and fuses it with an external and an internal RTC into one
//! authoritative date/time.
//!
//! # Examples
//!
//! ```
//! use dcf_clock::{ClockConfig, ClockManager, DateTime};
//! use dcf_clock::time::{SimExternalRtc, SimInternalRtc};
//!
//! let start = DateTime::from_ymd_hms(2025, 1, 1, 12, 0, 0).unwrap();
//! let mut clock = ClockManager::new(
//!     ClockConfig::default(),
//!     SimExternalRtc::frozen(start),
//!     SimInternalRtc::new(start),
//! ).unwrap();
//!
//! for ms in 0..2_000u32 {
//!     clock.poll_cycle(ms * 1_000, false);
//! }
//! assert!(clock.is_in_sync());
//! ```

pub mod core;
pub mod protocol;
pub mod sync;
pub mod time;
pub mod util;

// Re-export commonly used items
pub use crate::core::{ClockConfig, DateTime, Error, Result};
pub use crate::protocol::Dcf77Decoder;
pub use crate::sync::{ClockManager, ClockStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
