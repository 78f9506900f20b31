//! End-to-end acquisition scenarios driving the full clock with simulated sources

use dcf_clock::core::{ClockConfig, DateTime};
use dcf_clock::sync::{ClockManager, CycleReport, RadioIndicator};
use dcf_clock::time::{BusStatus, Dcf77Transmitter, SimExternalRtc, SimInternalRtc, SourceTag};

const STEP_US: u64 = 1_000;

type Clock = ClockManager<SimExternalRtc, SimInternalRtc>;

fn start() -> DateTime {
    DateTime::from_ymd_hms(2025, 12, 31, 23, 50, 0).unwrap()
}

fn clock(rtc: DateTime) -> Clock {
    ClockManager::new(
        ClockConfig::default(),
        SimExternalRtc::frozen(rtc),
        SimInternalRtc::new(rtc),
    )
    .unwrap()
}

/// Runs the clock from `from_us` to `to_us` of simulated time, returning every confirmed radio delivery
fn drive<F>(clock: &mut Clock, from_us: u64, to_us: u64, mut level: F) -> Vec<(u64, DateTime)>
where
    F: FnMut(u64) -> bool,
{
    let mut delivered = Vec::new();
    let mut t = from_us;
    while t < to_us {
        let report: CycleReport = clock.poll_cycle(t as u32, level(t));
        if let Some(dt) = report.radio {
            delivered.push((t, dt));
        }
        t += STEP_US;
    }
    delivered
}

fn minutes(n: u64) -> u64 {
    n * 60_000_000
}

#[test]
fn test_three_frames_confirm() {
    let tx = Dcf77Transmitter::new(start());
    let mut clock = clock(start());

    // Lead-in minute plus two decoded frames
    let early = drive(&mut clock, 0, minutes(3), |t| tx.level_at(t));
    assert!(early.is_empty());
    assert!(clock.confirmed_datetime().is_none());
    assert_eq!(clock.decoder().confirm_count(), 2);
    assert_ne!(clock.status().radio, RadioIndicator::InSync);

    let confirmed = drive(&mut clock, minutes(3), minutes(4), |t| tx.level_at(t));
    assert_eq!(confirmed.len(), 1);
    let (at, dt) = confirmed[0];
    // Delivered one second before the announced minute begins
    assert!(at > minutes(4) - 2_000_000);
    assert_eq!(dt, start().add_seconds(4 * 60).unwrap());

    let status = clock.status();
    assert_eq!(status.radio, RadioIndicator::InSync);
    assert!(status.in_sync);
}

#[test]
fn test_year_rollover_frames_confirm() {
    // Frames announce 23:58, 23:59 and then 00:00 of the new year
    let tx = Dcf77Transmitter::new(DateTime::from_ymd_hms(2025, 12, 31, 23, 56, 0).unwrap());
    let mut clock = clock(start());
    drive(&mut clock, 0, minutes(4), |t| tx.level_at(t));

    // The date change resets the counter
    assert_eq!(clock.decoder().last_accepted().map(|d| d.year), Some(2026));
    assert_eq!(clock.decoder().confirm_count(), 1);
}

#[test]
fn test_flipped_parity_rejects_frame() {
    let mut tx = Dcf77Transmitter::new(start());
    tx.flip_bit(3, 28);
    let mut clock = clock(start());

    drive(&mut clock, 0, minutes(3), |t| tx.level_at(t));
    let accepted = *clock.decoder().last_accepted().unwrap();
    assert_eq!(clock.decoder().confirm_count(), 2);

    let delivered = drive(&mut clock, minutes(3), minutes(4), |t| tx.level_at(t));
    assert!(delivered.is_empty());
    assert_eq!(clock.decoder().confirm_count(), 0);
    assert_eq!(clock.decoder().last_accepted(), Some(&accepted));

    // Three more clean frames are needed
    let delivered = drive(&mut clock, minutes(4), minutes(7), |t| tx.level_at(t));
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1, start().add_seconds(7 * 60).unwrap());
}

#[test]
fn test_time_jump_resets_confirmation() {
    let before = Dcf77Transmitter::new(start());
    // From minute 3 on the transmitter runs two minutes ahead
    let after = Dcf77Transmitter::new(start().add_seconds(120).unwrap());
    let level = |t: u64| if t < minutes(3) { before.level_at(t) } else { after.level_at(t) };
    let mut clock = clock(start());

    drive(&mut clock, 0, minutes(4), level);
    assert_eq!(clock.decoder().confirm_count(), 1);
    assert!(clock.confirmed_datetime().is_none());

    drive(&mut clock, minutes(4), minutes(5), level);
    assert_eq!(clock.decoder().confirm_count(), 2);
    let delivered = drive(&mut clock, minutes(5), minutes(6), level);
    assert_eq!(delivered.len(), 1);
    assert_eq!(clock.decoder().confirm_count(), 3);
}

#[test]
fn test_noisy_signal_still_decodes() {
    let tx = Dcf77Transmitter::new(start()).with_jitter(3_000.0, 42).unwrap();
    let mut clock = clock(start());
    let delivered = drive(&mut clock, 0, minutes(4), |t| tx.level_at(t));
    assert_eq!(delivered.len(), 1);
}

#[test]
fn test_radio_corrects_rtc_once() {
    // RTC two seconds off from the radio time
    let tx = Dcf77Transmitter::new(start());
    let announced = start().add_seconds(4 * 60).unwrap();
    let mut clock = clock(announced.add_seconds(2).unwrap());

    drive(&mut clock, 0, minutes(4) + 10_000_000, |t| tx.level_at(t));

    assert_eq!(clock.external_rtc().writes(), &[announced]);
    let status = clock.status();
    assert!(status.external_rtc_in_sync);
    assert!(status.internal_rtc_in_sync);
    assert_eq!(clock.internal_rtc().sets().last(), Some(&announced));
}

#[test]
fn test_failed_rtc_write_leaves_rtc_untrusted() {
    let tx = Dcf77Transmitter::new(start());
    let mut clock = clock(start());
    drive(&mut clock, 0, minutes(4) - 3_000_000, |t| tx.level_at(t));

    // The RTC drops off the bus right before the radio time is confirmed
    clock.external_rtc_mut().set_offline(true);
    drive(&mut clock, minutes(4) - 3_000_000, minutes(4) + 5_000_000, |t| tx.level_at(t));

    assert!(clock.external_rtc().writes().is_empty());
    let status = clock.status();
    assert!(!status.external_rtc_in_sync);
    assert_eq!(status.radio, RadioIndicator::InSync);
}

#[test]
fn test_fallback_to_internal_rtc() {
    let mut clock = clock(start());
    // Let the external RTC become the final source
    drive(&mut clock, 0, 3_000_000, |_| false);
    assert_eq!(clock.status().source, SourceTag::ExternalRtc);

    clock.external_rtc_mut().set_offline(true);
    // Through the second change at 6 s, when the final value is refreshed
    drive(&mut clock, 3_000_000, 6_001_000, |_| false);

    let status = clock.status();
    assert_eq!(status.source, SourceTag::InternalRtc);
    assert!(!status.external_rtc_in_sync);
    assert_eq!(status.in_sync, status.internal_rtc_in_sync);
    assert_eq!(status.datetime, *clock.arbiter().internal().datetime());
}

#[test]
fn test_status_serializes() {
    let mut clock = clock(start());
    clock.external_rtc_mut().fail_next(BusStatus::Aborted);
    drive(&mut clock, 0, 2_000_000, |_| false);

    let json = serde_json::to_value(clock.status()).unwrap();
    assert_eq!(json["radio"], "NoSignal");
    assert_eq!(json["quality"], 0);
    assert_eq!(json["datetime"]["year"], 2025);
}
