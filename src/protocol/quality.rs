use tracing::trace;

use crate::core::US_PER_SEC;
use crate::time::util::diff_us;
use crate::util::MovingSumFilter;
use super::QUALITY_WINDOW;

/// Bad pulses per second at which the signal counts as unusable
const MAX_BAD_PULSES: u32 = 5;

/// Raw quality of one second of reception, 0..=100
///
/// A perfect second carries exactly one good pulse. Every extra good pulse
/// counts as a bad one.
pub fn raw_quality(good: u32, bad: u32) -> u8 {
    if good == 1 && bad == 0 {
        return 100;
    }
    let bad = bad.saturating_add(good.saturating_sub(1));
    if bad == 0 || bad >= MAX_BAD_PULSES {
        // No pulses at all means no signal
        0
    } else {
        ((MAX_BAD_PULSES - bad) * 20) as u8
    }
}

/// Estimates the radio signal quality from pulse counts per second
#[derive(Debug, Clone, Default)]
pub struct SignalQuality {
    good: u32,
    bad: u32,
    last_eval_us: u32,
    filter: MovingSumFilter<QUALITY_WINDOW>,
    quality: u8,
}

impl SignalQuality {
    /// Creates an estimator with zero quality
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a pulse that classified as a bit
    pub fn record_good(&mut self) {
        self.good = self.good.saturating_add(1);
    }

    /// Counts a pulse that did not classify
    pub fn record_bad(&mut self) {
        self.bad = self.bad.saturating_add(1);
    }

    /// Evaluates the counts once more than a second has passed
    ///
    /// Returns the new smoothed quality when an evaluation took place.
    pub fn tick(&mut self, now_us: u32) -> Option<u8> {
        if diff_us(now_us, self.last_eval_us) <= US_PER_SEC {
            return None;
        }
        self.last_eval_us = now_us;

        let raw = raw_quality(self.good, self.bad);
        self.quality = self.filter.add(raw as i32).clamp(0, 100) as u8;
        trace!(good = self.good, bad = self.bad, raw, quality = self.quality, "signal quality");

        self.good = 0;
        self.bad = 0;
        Some(self.quality)
    }

    /// Smoothed quality, 0..=100
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_quality() {
        assert_eq!(raw_quality(1, 0), 100);
        assert_eq!(raw_quality(0, 0), 0);
        assert_eq!(raw_quality(1, 1), 80);
        assert_eq!(raw_quality(0, 2), 60);
        // Two extra good pulses count as bad
        assert_eq!(raw_quality(3, 1), 40);
        assert_eq!(raw_quality(0, 5), 0);
        assert_eq!(raw_quality(1, 9), 0);
    }

    #[test]
    fn test_evaluated_once_per_second() {
        let mut q = SignalQuality::new();
        q.record_good();
        assert_eq!(q.tick(1_000_000), None);
        assert_eq!(q.tick(1_000_001), Some(100));
        assert_eq!(q.quality(), 100);
        // Counts were reset and the next window has not elapsed
        assert_eq!(q.tick(2_000_001), None);
    }

    #[test]
    fn test_smoothing() {
        let mut q = SignalQuality::new();
        let mut now = 0u32;
        q.record_good();
        now += 1_000_001;
        assert_eq!(q.tick(now), Some(100));

        // One silent second pulls the average down by a tenth
        now += 1_000_001;
        assert_eq!(q.tick(now), Some(90));

        for _ in 0..9 {
            now += 1_000_001;
            q.tick(now);
        }
        assert_eq!(q.quality(), 0);
    }
}
