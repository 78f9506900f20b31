use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::{ClockConfig, DateTime, Result, US_PER_SEC};
use crate::protocol::Dcf77Decoder;
use crate::time::rtc::{ExternalRtc, InternalRtc, RequestOrigin, RtcCommand, RtcCompletion, RtcRequestQueue};
use crate::time::source::Timestamp;
use crate::time::util::diff_us;
use crate::time::SignalInput;
use super::arbiter::{ArbiterOutcome, TimeArbiter};
use super::status::{ClockStatus, RadioIndicator};

/// What happened in one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// The second counter advanced in this cycle
    pub second_changed: bool,
    /// Confirmed radio time delivered in this cycle
    pub radio: Option<DateTime>,
    /// External RTC request that finished in this cycle
    pub rtc_completion: Option<RtcCompletion>,
    /// Arbitration result
    pub arbiter: ArbiterOutcome,
}

/// Owns every component of the clock and runs the poll cycle
pub struct ClockManager<E, I> {
    config: ClockConfig,
    decoder: Dcf77Decoder,
    arbiter: TimeArbiter,
    rtc_queue: RtcRequestQueue,
    external_rtc: E,
    internal_rtc: I,
    /// Second counter driven by the microsecond clock
    sys_s: u32,
    /// Microsecond reading at the last second change
    second_start_us: u32,
}

impl<E: ExternalRtc, I: InternalRtc> ClockManager<E, I> {
    /// Creates a new clock manager
    pub fn new(config: ClockConfig, external_rtc: E, internal_rtc: I) -> Result<Self> {
        config.validate()?;

        Ok(ClockManager {
            decoder: Dcf77Decoder::new(&config),
            arbiter: TimeArbiter::new(&config),
            rtc_queue: RtcRequestQueue::new(config.rtc_read_interval_us()),
            config,
            external_rtc,
            internal_rtc,
            sys_s: 0,
            second_start_us: 0,
        })
    }

    /// Runs one cycle: external RTC, radio, internal RTC, then arbitration
    ///
    /// The staleness sweep runs after arbitration in cycles where the second
    /// counter advanced.
    pub fn poll_cycle(&mut self, now_us: u32, radio_level: bool) -> CycleReport {
        let second_changed = diff_us(now_us, self.second_start_us) >= US_PER_SEC;
        if second_changed {
            self.second_start_us = now_us;
            self.sys_s = self.sys_s.wrapping_add(1);
        }
        let now = Timestamp { us: now_us, s: self.sys_s };

        let mut report = CycleReport {
            second_changed,
            ..Default::default()
        };

        if let Some(completion) = self.rtc_queue.poll(&mut self.external_rtc, now_us) {
            self.on_rtc_completion(&completion, now);
            report.rtc_completion = Some(completion);
        }

        if let Some(dt) = self.decoder.poll(now_us, radio_level) {
            self.arbiter.record_radio(&dt, now);
            report.radio = Some(dt);
        }

        if self.internal_rtc.poll(now_us) {
            let dt = self.internal_rtc.last_value();
            self.arbiter.record_internal(&dt, now);
        }

        report.arbiter = self.arbiter.poll(now, &mut self.rtc_queue, &mut self.internal_rtc);

        if second_changed {
            self.arbiter.second_tick(now);
        }
        report
    }

    fn on_rtc_completion(&mut self, completion: &RtcCompletion, now: Timestamp) {
        match (completion.command, completion.origin) {
            (RtcCommand::Read, _) => {
                if !completion.is_read_success() {
                    return;
                }
                if let Some(dt) = completion.value {
                    self.arbiter.record_external(&dt, now);
                }
            }
            (RtcCommand::Write(_), RequestOrigin::Arbiter) => {
                self.arbiter.on_external_write_complete(completion.status);
            }
            (RtcCommand::Write(dt), origin) => {
                debug!(datetime = %dt, ?origin, status = ?completion.status, "external RTC write finished");
            }
        }
    }

    /// Queues an operator write of the external RTC
    pub fn request_rtc_set(&mut self, dt: &DateTime) {
        info!(datetime = %dt, "operator RTC set requested");
        self.rtc_queue.request_write(dt, RequestOrigin::Operator);
    }

    /// Parses operator input (`hh:mm:ss`, `DD.MM.YYYY`) and queues an RTC write
    pub fn set_time(&mut self, time: &str, date: &str) -> Result<DateTime> {
        let dt = DateTime::parse(time, date)?;
        self.request_rtc_set(&dt);
        Ok(dt)
    }

    /// Drives the poll cycle from `input` until `shutdown` becomes true
    pub async fn run<S: SignalInput + ?Sized>(
        &mut self,
        input: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(poll_interval = ?self.config.poll_interval, "clock started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    let now_us = input.now_us();
                    let level = input.radio_level();
                    self.poll_cycle(now_us, level);
                }
                changed = shutdown.changed() => {
                    // A dropped sender also stops the clock
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("clock stopped");
        Ok(())
    }

    /// Snapshot for the display
    pub fn status(&self) -> ClockStatus {
        let quality = self.decoder.quality();
        ClockStatus {
            datetime: self.arbiter.final_datetime(),
            in_sync: self.arbiter.is_in_sync(),
            source: self.arbiter.final_source(),
            radio: RadioIndicator::from_state(self.arbiter.radio().in_sync(), quality),
            external_rtc_in_sync: self.arbiter.external().in_sync(),
            internal_rtc_in_sync: self.arbiter.internal().in_sync(),
            quality,
            confirm_count: self.decoder.confirm_count(),
        }
    }

    /// Smoothed radio signal quality, 0..=100
    pub fn quality(&self) -> u8 {
        self.decoder.quality()
    }

    /// Confirmed radio time
    pub fn confirmed_datetime(&self) -> Option<DateTime> {
        self.decoder.confirmed_datetime()
    }

    /// Final date/time
    pub fn final_datetime(&self) -> DateTime {
        self.arbiter.final_datetime()
    }

    /// Whether the final date/time is trusted
    pub fn is_in_sync(&self) -> bool {
        self.arbiter.is_in_sync()
    }

    /// Time arbiter
    pub fn arbiter(&self) -> &TimeArbiter {
        &self.arbiter
    }

    /// Radio decoder
    pub fn decoder(&self) -> &Dcf77Decoder {
        &self.decoder
    }

    /// External RTC request queue
    pub fn rtc_queue(&self) -> &RtcRequestQueue {
        &self.rtc_queue
    }

    /// External RTC collaborator
    pub fn external_rtc(&self) -> &E {
        &self.external_rtc
    }

    /// External RTC collaborator, mutable
    pub fn external_rtc_mut(&mut self) -> &mut E {
        &mut self.external_rtc
    }

    /// Internal RTC collaborator
    pub fn internal_rtc(&self) -> &I {
        &self.internal_rtc
    }

    /// Internal RTC collaborator, mutable
    pub fn internal_rtc_mut(&mut self) -> &mut I {
        &mut self.internal_rtc
    }

    /// Seconds counted since start
    pub fn uptime_s(&self) -> u32 {
        self.sys_s
    }
}
