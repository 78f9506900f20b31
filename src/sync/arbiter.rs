use tracing::{debug, info, warn};

use crate::core::{ClockConfig, DateTime};
use crate::time::rtc::{BusStatus, InternalRtc, RequestOrigin, RtcRequestQueue};
use crate::time::source::{SourceTag, TimeSourceRecord, Timestamp};

/// Actions taken by one arbitration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterOutcome {
    /// Source the final value was taken from in this pass
    pub final_source: Option<SourceTag>,
    /// Correction queued for the external RTC
    pub rtc_write: Option<DateTime>,
    /// Result of a correction of the internal RTC
    pub internal_set: Option<bool>,
}

/// Decides the final date/time from the radio, the external RTC and the internal RTC
///
/// Priority is radio, then external RTC, then internal RTC. Lower priority
/// sources are corrected when they drift from a trusted final value.
#[derive(Debug, Clone)]
pub struct TimeArbiter {
    radio: TimeSourceRecord,
    external: TimeSourceRecord,
    internal: TimeSourceRecord,
    final_: TimeSourceRecord,
    /// Allowed difference before a source is corrected
    max_drift_secs: i32,
    /// Radio staleness window
    radio_timeout_s: u32,
    /// Staleness window of the other sources
    source_timeout_s: u32,
}

impl TimeArbiter {
    /// Creates an arbiter with empty records
    pub fn new(config: &ClockConfig) -> Self {
        TimeArbiter {
            radio: TimeSourceRecord::new(),
            external: TimeSourceRecord::new(),
            internal: TimeSourceRecord::new(),
            final_: TimeSourceRecord::new(),
            max_drift_secs: config.max_drift_secs,
            radio_timeout_s: config.radio_sync_timeout_secs(),
            source_timeout_s: config.source_timeout_secs(),
        }
    }

    /// Records a confirmed radio telegram
    pub fn record_radio(&mut self, dt: &DateTime, at: Timestamp) {
        self.radio.set_received(dt, SourceTag::Radio, at);
    }

    /// Records a successful external RTC read
    pub fn record_external(&mut self, dt: &DateTime, at: Timestamp) {
        self.external.set_received(dt, SourceTag::ExternalRtc, at);
    }

    /// Records a fresh internal RTC value
    pub fn record_internal(&mut self, dt: &DateTime, at: Timestamp) {
        self.internal.set_received(dt, SourceTag::InternalRtc, at);
    }

    /// Runs one arbitration pass over the readings received in this cycle
    pub fn poll<I: InternalRtc + ?Sized>(
        &mut self,
        now: Timestamp,
        rtc_queue: &mut RtcRequestQueue,
        internal_rtc: &mut I,
    ) -> ArbiterOutcome {
        let mut outcome = ArbiterOutcome::default();

        // Radio
        if self.radio.take_received() {
            let radio = *self.radio.datetime();
            self.set_final(&radio, SourceTag::Radio, now);
            outcome.final_source = Some(SourceTag::Radio);

            if self.radio.differs_from(&self.external, self.max_drift_secs) {
                info!(
                    radio = %radio,
                    rtc = %self.external.datetime(),
                    diff_s = radio.time_diff(self.external.datetime()),
                    "correcting external RTC"
                );
                rtc_queue.request_write(&radio, RequestOrigin::Arbiter);
                self.external.set_in_sync(false);
                outcome.rtc_write = Some(radio);
            }
            self.radio.set_in_sync(true);
        }

        // External RTC
        if self.external.take_received() {
            if !self.external.in_sync() {
                // Without radio the RTC is the best source left
                if !self.radio.in_sync() {
                    info!(rtc = %self.external.datetime(), "external RTC in sync");
                    self.external.set_in_sync(true);
                }
            } else if outcome.final_source.is_none() {
                let rtc = *self.external.datetime();
                self.set_final(&rtc, SourceTag::ExternalRtc, now);
                outcome.final_source = Some(SourceTag::ExternalRtc);
            }
        }

        // Internal RTC
        if self.internal.take_received() {
            let trusted = self.final_.in_sync() || outcome.final_source.is_some();
            if trusted
                && self.final_.tag() != SourceTag::InternalRtc
                && self.internal.differs_from(&self.final_, self.max_drift_secs)
            {
                let target = *self.final_.datetime();
                let ok = match internal_rtc.set(&target) {
                    Ok(()) => {
                        info!(datetime = %target, "internal RTC corrected");
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "internal RTC correction failed");
                        false
                    }
                };
                self.internal.set_in_sync(ok);
                outcome.internal_set = Some(ok);
            }
        }

        if outcome.final_source.is_some() {
            self.final_.set_in_sync(true);
        }
        outcome
    }

    /// Handles the completion of an external RTC write issued by [`TimeArbiter::poll`]
    pub fn on_external_write_complete(&mut self, status: BusStatus) {
        if status == BusStatus::Success {
            debug!("external RTC write confirmed");
            self.external.set_in_sync(true);
        }
    }

    /// Once-per-second staleness sweep
    pub fn second_tick(&mut self, now: Timestamp) {
        if self.radio.in_sync() && self.radio.is_stale(now.s, self.radio_timeout_s) {
            warn!("radio not in sync");
            self.radio.set_in_sync(false);
        }

        let timeout = self.source_timeout_s;
        for (name, record) in [
            ("external RTC", &mut self.external),
            ("internal RTC", &mut self.internal),
            ("final time", &mut self.final_),
        ] {
            if record.in_sync() && record.is_stale(now.s, timeout) {
                warn!("{} not in sync", name);
                record.set_in_sync(false);
            }
        }

        if !self.final_.in_sync() {
            let fallback = *self.internal.datetime();
            self.set_final(&fallback, SourceTag::InternalRtc, now);
            self.final_.set_in_sync(self.internal.in_sync());
        }
    }

    fn set_final(&mut self, dt: &DateTime, tag: SourceTag, now: Timestamp) {
        if self.final_.tag() != tag {
            info!(from = self.final_.tag().name(), to = tag.name(), "final time source switched");
        }
        self.final_.assign(dt, tag, now);
    }

    /// Final date/time
    pub fn final_datetime(&self) -> DateTime {
        *self.final_.datetime()
    }

    /// Whether the final date/time is trusted
    pub fn is_in_sync(&self) -> bool {
        self.final_.in_sync()
    }

    /// Source of the final date/time
    pub fn final_source(&self) -> SourceTag {
        self.final_.tag()
    }

    /// Radio record
    pub fn radio(&self) -> &TimeSourceRecord {
        &self.radio
    }

    /// External RTC record
    pub fn external(&self) -> &TimeSourceRecord {
        &self.external
    }

    /// Internal RTC record
    pub fn internal(&self) -> &TimeSourceRecord {
        &self.internal
    }

    /// Final record
    pub fn final_record(&self) -> &TimeSourceRecord {
        &self.final_
    }
}
