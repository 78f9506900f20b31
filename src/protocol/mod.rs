//! DCF77 protocol implementation
//!
//! This module turns the sampled receiver level into bits, collects the bits
//! of one minute, decodes the telegram and tracks the signal quality.

pub mod codec;
pub mod decoder;
pub mod frame;
pub mod pulse;
pub mod quality;
pub mod telegram;

pub use self::codec::TelegramCodec;
pub use self::decoder::Dcf77Decoder;
pub use self::frame::{BitSlot, BitSlots};
pub use self::pulse::{BitValue, EdgeEvent, Pulse, PulseAnalyzer};
pub use self::quality::SignalQuality;
pub use self::telegram::TelegramInterpreter;

// Constants
/// Bit slots per minute frame
pub const FRAME_SLOTS: usize = 60;

/// Time after a sync at which the frame is complete (us)
pub const FRAME_TIMEOUT_US: u32 = 59_000_000;

/// Number of one-second quality samples averaged
pub const QUALITY_WINDOW: usize = 10;
