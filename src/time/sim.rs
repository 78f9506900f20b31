//! Simulated time sources
//!
//! A DCF77 transmitter model and scripted RTCs, used by the integration
//! tests, the benchmark and the demo.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::core::{DateTime, Error, Result, US_PER_SEC};
use crate::protocol::{BitValue, TelegramCodec, FRAME_SLOTS};
use super::rtc::{BusStatus, ExternalRtc, InternalRtc};
use super::util::diff_us;
use super::SignalInput;

const US_PER_MINUTE: u64 = 60 * US_PER_SEC as u64;
const ZERO_PULSE_US: i64 = 100_000;
const ONE_PULSE_US: i64 = 200_000;

/// DCF77 transmitter model
///
/// Produces the receiver level at any instant after `start`, which must be
/// the beginning of a minute. As on air, the telegram sent during a minute
/// announces the following minute.
#[derive(Debug, Clone)]
pub struct Dcf77Transmitter {
    start: DateTime,
    codec: TelegramCodec,
    jitter: Option<Normal<f64>>,
    seed: u64,
    /// (minute index, bit) pairs transmitted inverted
    flipped: Vec<(u64, usize)>,
}

impl Dcf77Transmitter {
    /// Creates a transmitter with clean 100/200 ms pulses
    pub fn new(start: DateTime) -> Self {
        Dcf77Transmitter {
            start: DateTime { second: 0, ..start },
            codec: TelegramCodec::new(),
            jitter: None,
            seed: 0,
            flipped: Vec::new(),
        }
    }

    /// Adds Gaussian jitter with standard deviation `sigma_us` to every edge
    pub fn with_jitter(mut self, sigma_us: f64, seed: u64) -> Result<Self> {
        if !(sigma_us.is_finite() && sigma_us >= 0.0) {
            return Err(Error::config(format!("Invalid jitter: {}", sigma_us)));
        }
        let normal = Normal::new(0.0, sigma_us)
            .map_err(|e| Error::config(format!("Invalid jitter: {}", e)))?;
        self.jitter = Some(normal);
        self.seed = seed;
        Ok(self)
    }

    /// Inverts `bit` in the telegram sent during minute `minute` (counted from start)
    pub fn flip_bit(&mut self, minute: u64, bit: usize) {
        self.flipped.push((minute, bit));
    }

    /// Date/time at `elapsed_us` after start
    pub fn datetime_at(&self, elapsed_us: u64) -> DateTime {
        let secs = (elapsed_us / US_PER_SEC as u64) as i64;
        self.start.add_seconds(secs).unwrap_or(self.start)
    }

    /// Bits of the telegram sent during minute `minute`
    pub fn telegram(&self, minute: u64) -> [BitValue; FRAME_SLOTS] {
        let announced = self.datetime_at((minute + 1) * US_PER_MINUTE);
        let mut bits = self.codec.encode(&announced);
        for &(m, bit) in &self.flipped {
            if m != minute || bit >= FRAME_SLOTS {
                continue;
            }
            bits[bit] = match bits[bit] {
                BitValue::Zero => BitValue::One,
                BitValue::One => BitValue::Zero,
                BitValue::Undefined => BitValue::Undefined,
            };
        }
        bits
    }

    /// Receiver level at `elapsed_us`, true while the carrier is reduced
    pub fn level_at(&self, elapsed_us: u64) -> bool {
        let minute = elapsed_us / US_PER_MINUTE;
        let second = ((elapsed_us / US_PER_SEC as u64) % 60) as usize;
        let within = (elapsed_us % US_PER_SEC as u64) as i64;

        let len = match self.telegram(minute)[second] {
            BitValue::Zero => ZERO_PULSE_US,
            BitValue::One => ONE_PULSE_US,
            BitValue::Undefined => return false,
        };

        let (rise, fall) = match &self.jitter {
            Some(normal) => {
                // Same seed for every sample of one second keeps the edges stable
                let mut rng = StdRng::seed_from_u64(self.seed ^ (elapsed_us / US_PER_SEC as u64));
                let rise = normal.sample(&mut rng).abs() as i64;
                let fall = len + normal.sample(&mut rng) as i64;
                (rise, fall)
            }
            None => (0, len),
        };
        within >= rise && within < fall
    }
}

/// Input source fed by a simulated transmitter
#[derive(Debug, Clone)]
pub struct SimulatedSignal {
    transmitter: Dcf77Transmitter,
    clock: SimClock,
}

#[derive(Debug, Clone)]
enum SimClock {
    /// Follows the wall clock
    Realtime(Instant),
    /// Advances by a fixed step on every reading
    Stepped { elapsed_us: u64, step_us: u64 },
}

impl SimulatedSignal {
    /// Signal following the wall clock from now on
    pub fn realtime(transmitter: Dcf77Transmitter) -> Self {
        SimulatedSignal {
            transmitter,
            clock: SimClock::Realtime(Instant::now()),
        }
    }

    /// Signal on a virtual clock that advances `step_us` per reading
    pub fn stepped(transmitter: Dcf77Transmitter, step_us: u64) -> Self {
        SimulatedSignal {
            transmitter,
            clock: SimClock::Stepped { elapsed_us: 0, step_us },
        }
    }

    /// Time since the start of the transmission
    pub fn elapsed_us(&self) -> u64 {
        match &self.clock {
            SimClock::Realtime(start) => start.elapsed().as_micros() as u64,
            SimClock::Stepped { elapsed_us, .. } => *elapsed_us,
        }
    }

    /// Underlying transmitter
    pub fn transmitter(&self) -> &Dcf77Transmitter {
        &self.transmitter
    }
}

impl SignalInput for SimulatedSignal {
    fn now_us(&mut self) -> u32 {
        if let SimClock::Stepped { elapsed_us, step_us } = &mut self.clock {
            *elapsed_us += *step_us;
        }
        // Truncation models the wrapping hardware counter
        self.elapsed_us() as u32
    }

    fn radio_level(&mut self) -> bool {
        self.transmitter.level_at(self.elapsed_us())
    }
}

#[derive(Debug, Clone, Copy)]
enum BusOp {
    Read,
    Write(DateTime),
}

/// Scripted external RTC
#[derive(Debug, Clone)]
pub struct SimExternalRtc {
    value: DateTime,
    /// Set when the value runs with the wall clock
    since: Option<Instant>,
    latency: u32,
    busy_left: u32,
    op: Option<BusOp>,
    fail_next: Option<BusStatus>,
    offline: bool,
    last_read: DateTime,
    writes: Vec<DateTime>,
}

impl SimExternalRtc {
    /// RTC running with the wall clock from `start`
    pub fn new(start: DateTime) -> Self {
        SimExternalRtc {
            since: Some(Instant::now()),
            ..Self::frozen(start)
        }
    }

    /// RTC whose value only changes when written
    pub fn frozen(value: DateTime) -> Self {
        SimExternalRtc {
            value,
            since: None,
            latency: 1,
            busy_left: 0,
            op: None,
            fail_next: None,
            offline: false,
            last_read: DateTime::default(),
            writes: Vec::new(),
        }
    }

    /// Number of busy polls before a transfer completes
    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Makes the next transfer start fail with `status`
    pub fn fail_next(&mut self, status: BusStatus) {
        self.fail_next = Some(status);
    }

    /// While offline every transfer times out
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Changes the time kept by the chip
    pub fn set_value(&mut self, value: DateTime) {
        self.value = value;
        if self.since.is_some() {
            self.since = Some(Instant::now());
        }
    }

    /// Time currently kept by the chip
    pub fn current(&self) -> DateTime {
        match self.since {
            Some(since) => self
                .value
                .add_seconds(since.elapsed().as_secs() as i64)
                .unwrap_or(self.value),
            None => self.value,
        }
    }

    /// Values written so far
    pub fn writes(&self) -> &[DateTime] {
        &self.writes
    }

    fn start(&mut self, op: BusOp) -> BusStatus {
        if self.op.is_some() {
            return BusStatus::Busy;
        }
        if self.offline {
            return BusStatus::TimedOut;
        }
        if let Some(status) = self.fail_next.take() {
            return status;
        }
        self.op = Some(op);
        self.busy_left = self.latency;
        BusStatus::Success
    }

    fn step(&mut self) -> Option<BusOp> {
        if self.busy_left > 0 {
            self.busy_left -= 1;
            return None;
        }
        self.op.take()
    }
}

impl ExternalRtc for SimExternalRtc {
    fn read_start(&mut self) -> BusStatus {
        self.start(BusOp::Read)
    }

    fn read_poll(&mut self) -> BusStatus {
        match self.op {
            Some(BusOp::Read) => match self.step() {
                Some(_) => {
                    self.last_read = self.current();
                    BusStatus::Success
                }
                None => BusStatus::Busy,
            },
            _ => BusStatus::Aborted,
        }
    }

    fn last_value(&self) -> DateTime {
        self.last_read
    }

    fn write_start(&mut self, dt: &DateTime) -> BusStatus {
        self.start(BusOp::Write(*dt))
    }

    fn write_poll(&mut self) -> BusStatus {
        match self.op {
            Some(BusOp::Write(_)) => match self.step() {
                Some(BusOp::Write(dt)) => {
                    self.writes.push(dt);
                    self.set_value(dt);
                    BusStatus::Success
                }
                _ => BusStatus::Busy,
            },
            _ => BusStatus::Aborted,
        }
    }
}

/// Scripted internal RTC ticking on the poll clock
#[derive(Debug, Clone)]
pub struct SimInternalRtc {
    value: DateTime,
    last_tick_us: Option<u32>,
    running: bool,
    fail_set: bool,
    sets: Vec<DateTime>,
}

impl SimInternalRtc {
    /// Internal RTC starting at `value`
    pub fn new(value: DateTime) -> Self {
        SimInternalRtc {
            value,
            last_tick_us: None,
            running: true,
            fail_set: false,
            sets: Vec::new(),
        }
    }

    /// A stopped RTC never reports a fresh value
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Makes every following `set` fail
    pub fn set_fail(&mut self, fail: bool) {
        self.fail_set = fail;
    }

    /// Values set so far
    pub fn sets(&self) -> &[DateTime] {
        &self.sets
    }
}

impl InternalRtc for SimInternalRtc {
    fn poll(&mut self, now_us: u32) -> bool {
        if !self.running {
            return false;
        }
        match self.last_tick_us {
            None => {
                self.last_tick_us = Some(now_us);
                true
            }
            Some(last) if diff_us(now_us, last) >= US_PER_SEC => {
                self.last_tick_us = Some(last.wrapping_add(US_PER_SEC));
                self.value = self.value.add_seconds(1).unwrap_or(self.value);
                true
            }
            Some(_) => false,
        }
    }

    fn last_value(&self) -> DateTime {
        self.value
    }

    fn set(&mut self, dt: &DateTime) -> Result<()> {
        if self.fail_set {
            return Err(Error::rtc("internal RTC rejected the new value"));
        }
        self.value = *dt;
        self.sets.push(*dt);
        Ok(())
    }
}
