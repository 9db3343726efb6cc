//! Companion GATT client example
//!
//! Demonstrates reading a wearable over a real Bluetooth adapter:
//! - Scanning for the telemetry service
//! - Reading the current sample
//! - Streaming sample notifications
//!
//! Run with: cargo run --example companion_client

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::Manager;
use std::time::Duration;
use wearable_telemetry_ble::ble::TELEMETRY_SERVICE_UUID;
use wearable_telemetry_ble::{Error, Result, SampleCodec, TelemetryClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,wearable_telemetry_ble=debug")
        .init();

    println!("Companion Client");
    println!("================\n");

    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Internal("no Bluetooth adapter".to_string()))?;

    println!("Scanning for wearables...");
    adapter
        .start_scan(ScanFilter {
            services: vec![TELEMETRY_SERVICE_UUID],
        })
        .await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    adapter.stop_scan().await?;

    let Some(peripheral) = adapter.peripherals().await?.into_iter().next() else {
        println!("No wearable found.");
        return Ok(());
    };

    println!("Connecting to {:?}...", peripheral.id());
    peripheral.connect().await?;

    let client = TelemetryClient::new(peripheral.clone(), SampleCodec::default());
    client.discover().await?;

    let sample = client.read_sample().await?;
    println!("Current sample: {}", sample);

    let mut samples = client.samples();
    client.subscribe().await?;
    println!("\nStreaming notifications for 10 seconds...");

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = samples.recv() => match received {
                Ok(sample) => println!("  {}", sample),
                Err(e) => {
                    println!("  stream error: {}", e);
                    break;
                }
            },
        }
    }

    client.unsubscribe().await?;
    peripheral.disconnect().await?;

    Ok(())
}
