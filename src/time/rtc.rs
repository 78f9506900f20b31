use serde::{Serialize, Deserialize};
use tracing::{debug, trace, warn};

use crate::core::{DateTime, Result};
use super::util::diff_us;

/// Outcome of a bus transfer step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusStatus {
    /// Transfer started or finished successfully
    Success,
    /// Transfer still running, or the bus is occupied
    Busy,
    /// Transfer aborted by the peripheral
    Aborted,
    /// Transfer did not finish in time
    TimedOut,
}

/// Battery-backed RTC chip reached over a shared bus
///
/// Every call returns immediately. A transfer is started with one of the
/// `*_start` methods and then polled until the status is no longer
/// [`BusStatus::Busy`].
pub trait ExternalRtc {
    /// Starts reading the current date/time
    fn read_start(&mut self) -> BusStatus;

    /// Polls a running read
    fn read_poll(&mut self) -> BusStatus;

    /// Value of the last successful read
    fn last_value(&self) -> DateTime;

    /// Starts writing `dt` to the chip
    fn write_start(&mut self, dt: &DateTime) -> BusStatus;

    /// Polls a running write
    fn write_poll(&mut self) -> BusStatus;
}

/// Microcontroller RTC
pub trait InternalRtc {
    /// Returns true when a fresh value is available
    fn poll(&mut self, now_us: u32) -> bool;

    /// Latest value
    fn last_value(&self) -> DateTime;

    /// Sets the clock, synchronously
    fn set(&mut self, dt: &DateTime) -> Result<()>;
}

impl<T: ExternalRtc + ?Sized> ExternalRtc for Box<T> {
    fn read_start(&mut self) -> BusStatus {
        (**self).read_start()
    }

    fn read_poll(&mut self) -> BusStatus {
        (**self).read_poll()
    }

    fn last_value(&self) -> DateTime {
        (**self).last_value()
    }

    fn write_start(&mut self, dt: &DateTime) -> BusStatus {
        (**self).write_start(dt)
    }

    fn write_poll(&mut self) -> BusStatus {
        (**self).write_poll()
    }
}

impl<T: InternalRtc + ?Sized> InternalRtc for Box<T> {
    fn poll(&mut self, now_us: u32) -> bool {
        (**self).poll(now_us)
    }

    fn last_value(&self) -> DateTime {
        (**self).last_value()
    }

    fn set(&mut self, dt: &DateTime) -> Result<()> {
        (**self).set(dt)
    }
}

/// Operation requested from the external RTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RtcCommand {
    /// Read the current value
    Read,
    /// Write a new value
    Write(DateTime),
}

/// Who asked for an external RTC operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestOrigin {
    /// Scheduled read
    Periodic,
    /// Correction issued by the time arbiter
    Arbiter,
    /// Manual request, e.g. from a service console
    Operator,
}

/// Finished external RTC request, delivered exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RtcCompletion {
    /// Executed operation
    pub command: RtcCommand,
    /// Requester
    pub origin: RequestOrigin,
    /// Final bus status
    pub status: BusStatus,
    /// Value read, for successful reads only
    pub value: Option<DateTime>,
}

impl RtcCompletion {
    /// True for a successful read
    pub fn is_read_success(&self) -> bool {
        self.command == RtcCommand::Read && self.status == BusStatus::Success
    }
}

#[derive(Debug, Clone, Copy)]
struct Request {
    command: RtcCommand,
    origin: RequestOrigin,
    started: bool,
}

impl Request {
    fn new(command: RtcCommand, origin: RequestOrigin) -> Self {
        Request {
            command,
            origin,
            started: false,
        }
    }
}

/// Serializes access to the external RTC
///
/// Holds one executing request and one pending slot. A new request replaces
/// a pending one that has not started yet. Every poll performs at most one
/// bus step.
#[derive(Debug, Clone)]
pub struct RtcRequestQueue {
    executing: Option<Request>,
    pending: Option<Request>,
    read_interval_us: u32,
    last_read_us: Option<u32>,
}

impl RtcRequestQueue {
    /// Creates an idle queue reading the RTC every `read_interval_us`
    pub fn new(read_interval_us: u32) -> Self {
        RtcRequestQueue {
            executing: None,
            pending: None,
            read_interval_us,
            last_read_us: None,
        }
    }

    /// Requests writing `dt` to the external RTC
    pub fn request_write(&mut self, dt: &DateTime, origin: RequestOrigin) {
        self.enqueue(Request::new(RtcCommand::Write(*dt), origin));
    }

    fn enqueue(&mut self, request: Request) {
        if let Some(old) = self.pending.replace(request) {
            debug!(command = ?old.command, origin = ?old.origin, "pending RTC request replaced");
        }
    }

    /// Request waiting for the bus
    pub fn pending(&self) -> Option<(RtcCommand, RequestOrigin)> {
        self.pending.map(|r| (r.command, r.origin))
    }

    /// Request currently on the bus
    pub fn executing(&self) -> Option<(RtcCommand, RequestOrigin)> {
        self.executing.map(|r| (r.command, r.origin))
    }

    /// True when nothing is executing or pending
    pub fn is_idle(&self) -> bool {
        self.executing.is_none() && self.pending.is_none()
    }

    /// Advances the queue by one step
    ///
    /// Returns the completion of a request that finished in this step.
    pub fn poll<R: ExternalRtc + ?Sized>(&mut self, rtc: &mut R, now_us: u32) -> Option<RtcCompletion> {
        let mut request = match self.executing.take() {
            Some(request) => request,
            None => {
                self.schedule(now_us);
                return None;
            }
        };

        let (status, finished) = if request.started {
            let status = match request.command {
                RtcCommand::Read => rtc.read_poll(),
                RtcCommand::Write(_) => rtc.write_poll(),
            };
            (status, status != BusStatus::Busy)
        } else {
            request.started = true;
            let status = match &request.command {
                RtcCommand::Read => rtc.read_start(),
                RtcCommand::Write(dt) => rtc.write_start(dt),
            };
            (status, status != BusStatus::Success)
        };

        if !finished {
            self.executing = Some(request);
            return None;
        }

        if status != BusStatus::Success {
            warn!(command = ?request.command, origin = ?request.origin, ?status, "RTC request failed");
        } else {
            trace!(command = ?request.command, origin = ?request.origin, "RTC request done");
        }

        let value = match request.command {
            RtcCommand::Read if status == BusStatus::Success => Some(rtc.last_value()),
            _ => None,
        };
        Some(RtcCompletion {
            command: request.command,
            origin: request.origin,
            status,
            value,
        })
    }

    /// Moves the pending request onto the bus, or queues a periodic read when one is due
    fn schedule(&mut self, now_us: u32) {
        if let Some(request) = self.pending.take() {
            self.executing = Some(request);
            return;
        }

        let due = self
            .last_read_us
            .map_or(true, |last| diff_us(now_us, last) >= self.read_interval_us);
        if due {
            self.last_read_us = Some(now_us);
            self.pending = Some(Request::new(RtcCommand::Read, RequestOrigin::Periodic));
        }
    }
}
