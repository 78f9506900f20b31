use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::core::PulseTimings;
use crate::time::util::diff_us;

/// Value carried by one DCF77 pulse or bit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitValue {
    /// No valid value
    #[default]
    Undefined,
    /// Short pulse, logical 0
    Zero,
    /// Long pulse, logical 1
    One,
}

impl BitValue {
    /// Returns true for a zero or one bit
    pub fn is_defined(self) -> bool {
        self != BitValue::Undefined
    }
}

/// One carrier reduction of the radio signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pulse {
    /// Rising edge timestamp (us)
    pub start_us: u32,
    /// Falling edge timestamp (us)
    pub end_us: u32,
    /// Pulse length (us)
    pub len_us: u32,
    /// Rising edge seen
    pub rising: bool,
    /// Falling edge seen
    pub falling: bool,
    /// Classified value
    pub value: BitValue,
}

/// Result of analyzing one signal edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEvent {
    /// The gap before this rising edge marks the start of a minute
    Sync { at_us: u32 },
    /// A pulse classified as a zero or one bit
    Bit(Pulse),
    /// A complete pulse that is not a valid bit
    Rejected {
        /// Pulse length (us)
        len_us: u32,
        /// The pulse was too long, the current minute frame cannot be trusted
        signal_lost: bool,
    },
}

/// Classifies radio level transitions into bits and sync conditions
#[derive(Debug, Clone)]
pub struct PulseAnalyzer {
    timings: PulseTimings,
    /// Pulse currently being measured
    pulse: Pulse,
    /// Last pulse that classified as a bit
    last_accepted: Pulse,
}

impl PulseAnalyzer {
    /// Creates an analyzer with the given pulse bands
    pub fn new(timings: PulseTimings) -> Self {
        PulseAnalyzer {
            timings,
            pulse: Pulse::default(),
            last_accepted: Pulse::default(),
        }
    }

    /// Classifies a pulse length
    ///
    /// Returns the bit value and whether the pulse is long enough to
    /// invalidate the current sync.
    pub fn classify(&self, len_us: u32) -> (BitValue, bool) {
        let t = &self.timings;
        if len_us > t.bit0_min_us && len_us < t.bit0_max_us {
            (BitValue::Zero, false)
        } else if len_us >= t.bit1_min_us && len_us < t.bit1_max_us {
            (BitValue::One, false)
        } else {
            (BitValue::Undefined, len_us > t.bit1_max_us)
        }
    }

    /// Analyzes a level change; `level` is the new level (true while the carrier is reduced)
    ///
    /// Must only be called when the level differs from the previous sample.
    pub fn on_edge(&mut self, level: bool, now_us: u32) -> Option<EdgeEvent> {
        if level {
            self.on_rising(now_us)
        } else {
            self.on_falling(now_us)
        }
    }

    fn on_rising(&mut self, now_us: u32) -> Option<EdgeEvent> {
        let mut event = None;
        if self.pulse.falling {
            let gap = diff_us(now_us, self.pulse.end_us);
            if gap > self.timings.sync_min_us {
                event = Some(EdgeEvent::Sync { at_us: now_us });
            }
        }

        self.pulse = Pulse {
            start_us: now_us,
            rising: true,
            ..Pulse::default()
        };
        event
    }

    fn on_falling(&mut self, now_us: u32) -> Option<EdgeEvent> {
        self.pulse.falling = true;
        self.pulse.end_us = now_us;
        self.pulse.len_us = diff_us(now_us, self.pulse.start_us);

        if !self.pulse.rising {
            return None;
        }

        let (value, signal_lost) = self.classify(self.pulse.len_us);
        self.pulse.value = value;

        if value.is_defined() {
            self.last_accepted = self.pulse;
            Some(EdgeEvent::Bit(self.pulse))
        } else {
            let len_us = self.pulse.len_us;
            trace!(len_us, signal_lost, "pulse rejected");
            // Falling back to the last good pulse keeps its falling edge as the
            // reference for the next sync gap
            self.pulse = self.last_accepted;
            Some(EdgeEvent::Rejected { len_us, signal_lost })
        }
    }

    /// Last pulse that classified as a bit
    pub fn last_accepted(&self) -> &Pulse {
        &self.last_accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> PulseAnalyzer {
        PulseAnalyzer::new(PulseTimings::default())
    }

    fn pulse(analyzer: &mut PulseAnalyzer, start_us: u32, len_us: u32) -> Option<EdgeEvent> {
        analyzer.on_edge(true, start_us);
        analyzer.on_edge(false, start_us.wrapping_add(len_us))
    }

    #[test]
    fn test_classification_boundaries() {
        let a = analyzer();
        assert_eq!(a.classify(50_000), (BitValue::Undefined, false));
        assert_eq!(a.classify(50_001), (BitValue::Zero, false));
        assert_eq!(a.classify(174_999), (BitValue::Zero, false));
        assert_eq!(a.classify(175_000), (BitValue::Undefined, false));
        assert_eq!(a.classify(175_001), (BitValue::One, false));
        assert_eq!(a.classify(349_999), (BitValue::One, false));
        assert_eq!(a.classify(350_000), (BitValue::Undefined, false));
        assert_eq!(a.classify(350_001), (BitValue::Undefined, true));
    }

    #[test]
    fn test_bits_from_edges() {
        let mut a = analyzer();
        match pulse(&mut a, 1_000_000, 100_000) {
            Some(EdgeEvent::Bit(p)) => {
                assert_eq!(p.value, BitValue::Zero);
                assert_eq!(p.start_us, 1_000_000);
                assert_eq!(p.len_us, 100_000);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match pulse(&mut a, 2_000_000, 200_000) {
            Some(EdgeEvent::Bit(p)) => assert_eq!(p.value, BitValue::One),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_falling_edge_without_rising_is_ignored() {
        let mut a = analyzer();
        assert_eq!(a.on_edge(false, 500_000), None);
    }

    #[test]
    fn test_sync_after_gap() {
        let mut a = analyzer();
        pulse(&mut a, 0, 100_000);
        // Next rising edge 1.9 s after the falling edge
        assert_eq!(a.on_edge(true, 2_000_000), Some(EdgeEvent::Sync { at_us: 2_000_000 }));
        // Regular one second spacing is no sync
        a.on_edge(false, 2_100_000);
        assert_eq!(a.on_edge(true, 3_000_000), None);
    }

    #[test]
    fn test_glitch_keeps_sync_reference() {
        let mut a = analyzer();
        pulse(&mut a, 0, 100_000);
        // A 10 ms glitch inside the minute gap
        assert_eq!(
            pulse(&mut a, 1_000_000, 10_000),
            Some(EdgeEvent::Rejected { len_us: 10_000, signal_lost: false })
        );
        // The gap is still measured from the last good pulse
        assert_eq!(a.on_edge(true, 2_000_000), Some(EdgeEvent::Sync { at_us: 2_000_000 }));
    }

    #[test]
    fn test_long_pulse_loses_signal() {
        let mut a = analyzer();
        assert_eq!(
            pulse(&mut a, 0, 600_000),
            Some(EdgeEvent::Rejected { len_us: 600_000, signal_lost: true })
        );
    }

    #[test]
    fn test_timer_wraparound() {
        let mut a = analyzer();
        match pulse(&mut a, u32::MAX - 50_000, 150_000) {
            Some(EdgeEvent::Bit(p)) => assert_eq!(p.len_us, 150_000),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
