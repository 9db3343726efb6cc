//! Loopback batch transfer example
//!
//! Demonstrates a wearable and a companion linked in memory:
//! - Recording samples into the bulk buffer
//! - Automatic transfer when the batch fills up
//! - Receiving and decoding the batch on the companion
//!
//! Run with: cargo run --example loopback_transfer
//!
//! To change the batch size:
//!   cargo run --example loopback_transfer -- --capacity 10

use std::sync::Arc;
use std::time::Duration;
use wearable_telemetry_ble::{
    CompanionService, Error, LatestReadings, MemoryTransport, Result, SampleSource, SensorKind,
    SyncConfig, WearableService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,wearable_telemetry_ble=debug")
        .init();

    println!("Loopback Batch Transfer");
    println!("=======================\n");

    let args: Vec<String> = std::env::args().collect();
    let capacity = args
        .iter()
        .position(|arg| arg == "--capacity")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let config = SyncConfig::default().with_capacity(capacity);
    println!("Batch capacity: {} samples", config.capacity_samples);
    println!("Record schema:  {}", config.schema);
    println!("Channel path:   {}\n", config.channel_path);

    let (watch, phone) = MemoryTransport::pair("watch", "phone");
    let events = phone
        .take_events()
        .ok_or_else(|| Error::Internal("events already taken".to_string()))?;

    let companion = CompanionService::new(config.clone(), phone.clone(), events)?;
    let mut batches = companion.batches();
    companion.start()?;

    let readings = Arc::new(LatestReadings::new());
    let wearable = WearableService::new(config, readings.clone(), watch)?;
    wearable.start();

    for i in 0..capacity {
        readings.update(SensorKind::Eda, 0.35 + i as f64 * 0.01);
        readings.update(SensorKind::SkinTemperature, 33.0 + i as f64 * 0.05);

        let full = wearable.record_sample(&readings.current_sample());
        println!("Recorded sample {:>2}{}", i + 1, if full { " (batch full)" } else { "" });
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    match tokio::time::timeout(Duration::from_secs(5), batches.recv()).await {
        Ok(Ok(batch)) => {
            println!("\nCompanion received {} samples from {}", batch.samples.len(), batch.peer);
            for sample in batch.samples.iter().take(3) {
                println!("  {}", sample);
            }
        }
        Ok(Err(e)) => println!("\nBatch stream error: {}", e),
        Err(_) => println!("\nNo batch received"),
    }

    wearable.stop();
    companion.stop().await;

    Ok(())
}
