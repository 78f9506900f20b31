use std::cmp::Ordering;

use tracing::{debug, info};

use crate::core::{DateTime, CONFIRM_THRESHOLD};
use super::codec::TelegramCodec;
use super::frame::BitSlots;

/// Smallest accepted distance between two consecutive telegrams (seconds of day)
pub const MIN_TELEGRAM_GAP_S: i32 = 30;
/// Largest accepted distance between two consecutive telegrams (seconds of day)
pub const MAX_TELEGRAM_GAP_S: i32 = 90;

/// Decodes completed frames and tracks how many consecutive telegrams agree
#[derive(Debug, Clone)]
pub struct TelegramInterpreter {
    codec: TelegramCodec,
    /// Last successfully decoded telegram
    last_accepted: Option<DateTime>,
    /// Whether the most recent frame decoded
    last_valid: bool,
    confirm_count: u32,
    threshold: u32,
}

impl Default for TelegramInterpreter {
    fn default() -> Self {
        Self::new(CONFIRM_THRESHOLD)
    }
}

impl TelegramInterpreter {
    /// Creates an interpreter requiring `threshold` consecutive telegrams
    pub fn new(threshold: u32) -> Self {
        TelegramInterpreter {
            codec: TelegramCodec::new(),
            last_accepted: None,
            last_valid: false,
            confirm_count: 0,
            threshold,
        }
    }

    /// Interprets a completed frame
    ///
    /// Returns the decoded value on success. A failed decode resets the
    /// confirmation count and keeps the previously accepted value.
    pub fn interpret(&mut self, slots: &BitSlots) -> Option<DateTime> {
        let decoded = match self.codec.decode(slots) {
            Ok(dt) => dt,
            Err(e) => {
                debug!(error = %e, defined = slots.defined_count(), "telegram rejected");
                self.confirm_count = 0;
                self.last_valid = false;
                return None;
            }
        };

        match self.last_accepted {
            Some(prev) if self.last_valid && !Self::is_continuous(&prev, &decoded) => {
                debug!(%prev, %decoded, "telegram discontinuity");
                self.confirm_count = 1;
            }
            _ => self.confirm_count = self.confirm_count.saturating_add(1),
        }

        self.last_accepted = Some(decoded);
        self.last_valid = true;

        if self.is_confirmed() {
            info!(datetime = %decoded, count = self.confirm_count, "telegram confirmed");
        } else {
            debug!(datetime = %decoded, count = self.confirm_count, "telegram accepted");
        }
        Some(decoded)
    }

    /// Checks that `next` plausibly follows `prev` one minute later
    pub fn is_continuous(prev: &DateTime, next: &DateTime) -> bool {
        let diff = next.time_diff(prev);
        (MIN_TELEGRAM_GAP_S..=MAX_TELEGRAM_GAP_S).contains(&diff)
            && next.date_cmp(prev) == Ordering::Equal
    }

    /// True when the latest telegram decoded and enough consecutive ones agree
    pub fn is_confirmed(&self) -> bool {
        self.last_valid && self.confirm_count >= self.threshold
    }

    /// Confirmed radio time, if any
    pub fn confirmed(&self) -> Option<DateTime> {
        if self.is_confirmed() {
            self.last_accepted
        } else {
            None
        }
    }

    /// Last successfully decoded telegram, confirmed or not
    pub fn last_accepted(&self) -> Option<&DateTime> {
        self.last_accepted.as_ref()
    }

    /// Number of consecutive agreeing telegrams
    pub fn confirm_count(&self) -> u32 {
        self.confirm_count
    }

    /// Whether the most recent frame decoded
    pub fn last_valid(&self) -> bool {
        self.last_valid
    }
}
