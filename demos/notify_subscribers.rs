//! Notification subscription example
//!
//! Demonstrates the wearable's GATT surface without a radio:
//! - Feeding GATT events into the server
//! - Enabling notifications through the client config descriptor
//! - Periodic notification passes
//! - Cleanup on disconnect
//!
//! Run with: cargo run --example notify_subscribers

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wearable_telemetry_ble::ble::CLIENT_CONFIG_UUID;
use wearable_telemetry_ble::protocol::ENABLE_NOTIFICATION_VALUE;
use wearable_telemetry_ble::{
    ConnectionState, GattEvent, GattResponse, GattServerHandle, MemoryTransport, PeerId, Result,
    Sample, SampleCodec, SyncConfig, WearableService,
};

/// Prints what would go over the air.
struct ConsoleBackend;

impl GattServerHandle for ConsoleBackend {
    fn send_response(&self, peer: &PeerId, request_id: u32, response: GattResponse) -> Result<()> {
        println!(
            "  -> response to {} (request {}): status 0x{:04X}",
            peer,
            request_id,
            response.status.code()
        );
        Ok(())
    }

    fn notify(&self, peer: &PeerId, _characteristic: Uuid, value: &[u8]) -> Result<()> {
        match SampleCodec::default().decode(value) {
            Ok(sample) => println!("  -> notify {}: {}", peer, sample),
            Err(e) => println!("  -> notify {}: {}", peer, e),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,wearable_telemetry_ble=info")
        .init();

    println!("Notification Subscribers");
    println!("========================\n");

    let (watch, _phone) = MemoryTransport::pair("watch", "phone");
    let config = SyncConfig::default().with_notification_interval(Duration::from_millis(500));
    let wearable = WearableService::new(config, Arc::new(|| Sample::new(0.42, 33.7)), watch)?;
    wearable.server().attach(Arc::new(ConsoleBackend));

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let serving = wearable.serve(rx);
    let phone = PeerId::from("phone");

    println!("Phone connects and enables notifications");
    let events = [
        GattEvent::ConnectionStateChanged {
            peer: phone.clone(),
            state: ConnectionState::Connected,
        },
        GattEvent::DescriptorWrite {
            peer: phone.clone(),
            request_id: 1,
            descriptor: CLIENT_CONFIG_UUID,
            response_needed: true,
            value: Bytes::from_static(&ENABLE_NOTIFICATION_VALUE),
        },
    ];
    for event in events {
        if tx.send(event).await.is_err() {
            break;
        }
    }

    wearable.start();
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("\nPhone disconnects");
    let _ = tx
        .send(GattEvent::ConnectionStateChanged {
            peer: phone,
            state: ConnectionState::Disconnected,
        })
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    println!("\nSubscribers left: {}", wearable.registry().len());

    wearable.stop();
    drop(tx);
    let _ = serving.await;

    Ok(())
}
