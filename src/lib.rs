// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # wearable-telemetry-ble
//!
//! Sensor telemetry synchronization between a wearable and its paired
//! companion device.
//!
//! The wearable encodes each sensor sample (timestamp, EDA, skin
//! temperature and optionally heart rate) into a fixed-width big-endian
//! record. Samples are served live over a BLE GATT characteristic with
//! notifications, and batched into a bulk buffer that is shipped to the
//! companion over a one-shot byte-stream channel whenever it fills up.
//!
//! ## Features
//!
//! - **Sample Codec**: Fixed-width binary records, single and bulk
//! - **Bulk Buffer**: Fixed-capacity batch with a fullness signal
//! - **GATT Serving**: Sensor data reads and notification subscriptions
//! - **Channel Transfers**: One-shot sender and end-of-stream receiver
//! - **Companion Client**: btleplug client for the telemetry service
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wearable_telemetry_ble::{
//!     CompanionService, MemoryTransport, Result, Sample, SyncConfig, WearableService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (watch, phone) = MemoryTransport::pair("watch", "phone");
//!     let config = SyncConfig::default().with_capacity(3);
//!
//!     let companion = CompanionService::new(config.clone(), phone.clone(), phone.take_events().unwrap())?;
//!     let mut batches = companion.batches();
//!     companion.start()?;
//!
//!     let wearable = WearableService::new(config, Arc::new(|| Sample::new(0.4, 33.1)), watch)?;
//!     wearable.start();
//!     for i in 0..3 {
//!         wearable.record_sample(&Sample::new(0.1 * i as f64, 32.0));
//!     }
//!
//!     if let Ok(batch) = batches.recv().await {
//!         println!("Received {} samples from {}", batch.samples.len(), batch.peer);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod command;
pub mod companion;
pub mod config;
pub mod data;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod transfer;
pub mod utils;
pub mod wearable;

// Re-exports for convenience
pub use command::ServiceCommand;
pub use companion::CompanionService;
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use peer::PeerId;
pub use utils::{millis_to_datetime, now_millis};
pub use wearable::WearableService;

// Re-export commonly used types from submodules
pub use ble::{
    ConnectionState, DispatchOutcome, GattEvent, GattResponse, GattServerHandle, GattStatus,
    NotificationDispatcher, SubscriptionRegistry, TelemetryClient, TelemetryGattServer,
};
pub use data::{BulkSampleBuffer, LatestReadings, Sample, SampleSource, SensorKind};
pub use protocol::{NotificationState, SampleCodec, SampleSchema};
pub use transfer::{
    Channel, ChannelEvent, ChannelTransport, MemoryTransport, ReceivedBatch, TelemetryReceiver,
    TelemetrySender, TransferReport,
};
