use std::time::Duration;

use dcf_clock::core::{ClockConfig, DateTime};
use dcf_clock::sync::ClockManager;
use dcf_clock::time::{Dcf77Transmitter, SimExternalRtc, SimInternalRtc, SimulatedSignal};
use tokio::sync::watch;

// Simulated time runs as fast as the poll loop allows
#[tokio::main(flavor = "current_thread", start_paused = true)]
async fn main() -> dcf_clock::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let on_air = DateTime::from_ymd_hms(2026, 3, 29, 1, 55, 0)?;
    // RTC is three minutes behind the transmitter
    let rtc_value = on_air.add_seconds(-180).unwrap_or(on_air);

    let transmitter = Dcf77Transmitter::new(on_air).with_jitter(2_000.0, 7)?;
    let mut signal = SimulatedSignal::stepped(transmitter, 1_000);
    let mut clock = ClockManager::new(
        ClockConfig::default(),
        SimExternalRtc::frozen(rtc_value),
        SimInternalRtc::new(rtc_value),
    )?;

    println!("Transmitter starts at {}", on_air);
    println!("RTC starts at         {}", rtc_value);
    println!("\nRunning for 5 simulated minutes...");

    let (stop_tx, stop_rx) = watch::channel(false);
    let stopper = async move {
        tokio::time::sleep(Duration::from_secs(300)).await;
        let _ = stop_tx.send(true);
    };
    let (result, ()) = tokio::join!(clock.run(&mut signal, stop_rx), stopper);
    result?;

    let status = clock.status();
    println!("\nFinal status:");
    match serde_json::to_string_pretty(&status) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize status: {}", e),
    }
    println!("\nRTC writes: {:?}", clock.external_rtc().writes());

    Ok(())
}
