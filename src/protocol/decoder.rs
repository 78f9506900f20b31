use tracing::{debug, info, warn};

use crate::core::{ClockConfig, DateTime};
use crate::time::util::diff_us;
use super::frame::BitSlots;
use super::pulse::{EdgeEvent, Pulse, PulseAnalyzer};
use super::quality::SignalQuality;
use super::telegram::TelegramInterpreter;
use super::FRAME_TIMEOUT_US;

/// DCF77 decoder driven by one level sample per poll cycle
///
/// Edge analysis and frame bookkeeping run in separate cycles so that a
/// single poll never does both.
#[derive(Debug, Clone)]
pub struct Dcf77Decoder {
    analyzer: PulseAnalyzer,
    slots: BitSlots,
    interpreter: TelegramInterpreter,
    quality: SignalQuality,
    /// Level seen in the previous cycle
    level: bool,
    /// Bit waiting to be stored in the frame
    pending: Option<Pulse>,
    sync_detected: bool,
    sync_valid: bool,
    sync_us: u32,
}

impl Dcf77Decoder {
    /// Creates a decoder from the clock configuration
    pub fn new(config: &ClockConfig) -> Self {
        Dcf77Decoder {
            analyzer: PulseAnalyzer::new(config.pulse),
            slots: BitSlots::new(),
            interpreter: TelegramInterpreter::new(config.confirm_threshold),
            quality: SignalQuality::new(),
            level: false,
            pending: None,
            sync_detected: false,
            sync_valid: false,
            sync_us: 0,
        }
    }

    /// Processes one level sample
    ///
    /// `level` is true while the carrier is reduced. Returns the radio time
    /// when a frame just completed and the telegram count reached the
    /// confirmation threshold.
    pub fn poll(&mut self, now_us: u32, level: bool) -> Option<DateTime> {
        if level != self.level {
            self.level = level;
            self.on_edge(level, now_us);
            return None;
        }

        self.quality.tick(now_us);

        if self.sync_detected {
            self.sync_detected = false;
            self.sync_valid = true;
            self.pending = None;
            self.slots.clear();
            return None;
        }

        if !self.sync_valid {
            return None;
        }

        if diff_us(now_us, self.sync_us) > FRAME_TIMEOUT_US {
            self.sync_valid = false;
            debug!(defined = self.slots.defined_count(), "frame complete");
            self.interpreter.interpret(&self.slots);
            return self.interpreter.confirmed();
        }

        if let Some(pulse) = self.pending.take() {
            self.slots.store(&pulse, self.sync_us);
        }
        None
    }

    fn on_edge(&mut self, level: bool, now_us: u32) {
        match self.analyzer.on_edge(level, now_us) {
            Some(EdgeEvent::Sync { at_us }) => {
                info!(at_us, "minute sync");
                self.sync_detected = true;
                self.sync_us = at_us;
            }
            Some(EdgeEvent::Bit(pulse)) => {
                self.quality.record_good();
                self.pending = Some(pulse);
            }
            Some(EdgeEvent::Rejected { signal_lost, len_us }) => {
                self.quality.record_bad();
                if signal_lost && self.sync_valid {
                    warn!(len_us, "signal lost, dropping frame");
                    self.sync_valid = false;
                }
            }
            None => {}
        }
    }

    /// Smoothed signal quality, 0..=100
    pub fn quality(&self) -> u8 {
        self.quality.quality()
    }

    /// Radio time confirmed by enough consecutive telegrams
    pub fn confirmed_datetime(&self) -> Option<DateTime> {
        self.interpreter.confirmed()
    }

    /// Last decoded telegram, confirmed or not
    pub fn last_accepted(&self) -> Option<&DateTime> {
        self.interpreter.last_accepted()
    }

    /// Number of consecutive agreeing telegrams
    pub fn confirm_count(&self) -> u32 {
        self.interpreter.confirm_count()
    }

    /// Whether a minute frame is currently being received
    pub fn sync_valid(&self) -> bool {
        self.sync_valid
    }

    /// Bits received so far in the current frame
    pub fn slots(&self) -> &BitSlots {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::TelegramCodec;
    use crate::protocol::pulse::BitValue;

    const STEP_US: u32 = 1_000;

    /// Feeds one minute of carrier reductions starting at `t0`, sampled every millisecond
    fn feed_minute(decoder: &mut Dcf77Decoder, t0: u32, bits: &[BitValue; 60]) -> (u32, Option<DateTime>) {
        let mut result = None;
        let mut now = t0;
        for bit in bits.iter() {
            let len_ms = match bit {
                BitValue::Zero => 100,
                BitValue::One => 200,
                BitValue::Undefined => 0,
            };
            for ms in 0..1000u32 {
                let level = ms < len_ms;
                if let Some(dt) = decoder.poll(now, level) {
                    result = Some(dt);
                }
                now = now.wrapping_add(STEP_US);
            }
        }
        (now, result)
    }

    #[test]
    fn test_decoder_confirms_after_three_minutes() {
        let codec = TelegramCodec::new();
        let mut decoder = Dcf77Decoder::new(&ClockConfig::default());
        let t0 = DateTime::from_ymd_hms(2025, 11, 3, 21, 58, 0).unwrap();

        // Lead-in minute without a preceding sync gap is not decodable
        let (mut now, first) = feed_minute(&mut decoder, 5_000_000, &codec.encode(&t0));
        assert_eq!(first, None);
        assert!(decoder.quality() > 80);

        let mut confirmed = Vec::new();
        for minute in 1..=3 {
            let dt = t0.add_seconds(60 * minute).unwrap();
            let (next, got) = feed_minute(&mut decoder, now, &codec.encode(&dt));
            now = next;
            confirmed.push(got);
        }

        assert_eq!(confirmed[0], None);
        assert_eq!(confirmed[1], None);
        assert_eq!(confirmed[2], t0.add_seconds(180));
        assert_eq!(decoder.confirm_count(), 3);
    }

    #[test]
    fn test_long_pulse_drops_frame() {
        let mut decoder = Dcf77Decoder::new(&ClockConfig::default());
        let mut now = 0u32;
        // Gap long enough to sync, then one bit
        for (level, ms) in [(true, 100), (false, 1_900), (true, 100), (false, 10)] {
            for _ in 0..ms {
                decoder.poll(now, level);
                now += STEP_US;
            }
        }
        assert!(decoder.sync_valid());

        for (level, ms) in [(true, 600), (false, 10)] {
            for _ in 0..ms {
                decoder.poll(now, level);
                now += STEP_US;
            }
        }
        assert!(!decoder.sync_valid());
    }

    #[test]
    fn test_no_signal_quality_zero() {
        let mut decoder = Dcf77Decoder::new(&ClockConfig::default());
        for i in 0..5_000u32 {
            decoder.poll(i * STEP_US, false);
        }
        assert_eq!(decoder.quality(), 0);
        assert!(decoder.confirmed_datetime().is_none());
    }
}
