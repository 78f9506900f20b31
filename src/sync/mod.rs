//! Synchronization module
//!
//! This module decides which time source is authoritative, keeps the lower
//! priority sources corrected and drives the poll cycle of the whole clock.

pub mod arbiter;
pub mod manager;
pub mod status;

pub use self::arbiter::{ArbiterOutcome, TimeArbiter};
pub use self::manager::{ClockManager, CycleReport};
pub use self::status::{ClockStatus, RadioIndicator};
