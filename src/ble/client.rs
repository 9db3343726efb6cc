//! Companion-side GATT client.
//!
//! Reads and subscribes to the wearable's sensor data characteristic over
//! an already-connected btleplug peripheral. Discovery and connection
//! establishment are left to the caller.

use btleplug::api::{Characteristic, Descriptor, Peripheral as _};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::uuids::{CLIENT_CONFIG_UUID, SENSOR_DATA_UUID, TELEMETRY_SERVICE_UUID};
use crate::data::Sample;
use crate::error::{Error, Result};
use crate::protocol::{NotificationState, SampleCodec};
use crate::utils::hex_preview;

/// GATT client for the telemetry service of one wearable.
pub struct TelemetryClient {
    peripheral: Peripheral,
    codec: SampleCodec,
    sensor_data: RwLock<Option<Characteristic>>,
    sample_tx: broadcast::Sender<Sample>,
    is_listening: Arc<AtomicBool>,
    listener_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl TelemetryClient {
    /// Create a client for a connected peripheral.
    pub fn new(peripheral: Peripheral, codec: SampleCodec) -> Self {
        let (sample_tx, _) = broadcast::channel(64);

        Self {
            peripheral,
            codec,
            sensor_data: RwLock::new(None),
            sample_tx,
            is_listening: Arc::new(AtomicBool::new(false)),
            listener_handle: RwLock::new(None),
        }
    }

    /// Locate the sensor data characteristic.
    ///
    /// Services are discovered first if the peripheral has none cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the peripheral is not connected,
    /// or a not-found error if the telemetry service or characteristic is
    /// missing.
    pub async fn discover(&self) -> Result<()> {
        if !self.peripheral.is_connected().await? {
            return Err(Error::NotConnected);
        }

        if self.peripheral.services().is_empty() {
            debug!("No cached services, discovering");
            self.peripheral.discover_services().await?;
        }

        let services = self.peripheral.services();
        let service = services
            .iter()
            .find(|s| s.uuid == TELEMETRY_SERVICE_UUID)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: TELEMETRY_SERVICE_UUID.to_string(),
            })?;

        let characteristic = service
            .characteristics
            .iter()
            .find(|c| c.uuid == SENSOR_DATA_UUID)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: SENSOR_DATA_UUID.to_string(),
            })?;

        debug!(
            "Found sensor data characteristic, properties: {:?}",
            characteristic.properties
        );
        *self.sensor_data.write() = Some(characteristic);

        Ok(())
    }

    fn characteristic(&self) -> Result<Characteristic> {
        self.sensor_data
            .read()
            .clone()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: SENSOR_DATA_UUID.to_string(),
            })
    }

    /// Write the telemetry configuration descriptor.
    ///
    /// The wearable tracks subscribers through its own configuration
    /// descriptor rather than the standard CCCD, so notifications are
    /// toggled by writing it directly.
    async fn write_notification_state(&self, state: NotificationState) -> Result<()> {
        let characteristic = self.characteristic()?;
        let descriptor = config_descriptor(&characteristic)?;
        self.peripheral
            .write_descriptor(&descriptor, &state.to_descriptor_value())
            .await?;
        debug!("Wrote {:?} to {}", state, descriptor.uuid);
        Ok(())
    }

    /// Read the current sample.
    pub async fn read_sample(&self) -> Result<Sample> {
        let characteristic = self.characteristic()?;
        let data = self.peripheral.read(&characteristic).await?;
        trace!("Read sensor data: {}", hex_preview(&data));
        self.codec.decode(&data)
    }

    /// Enable notifications and start republishing decoded samples.
    pub async fn subscribe(&self) -> Result<()> {
        if self.is_listening.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.write_notification_state(NotificationState::Enabled).await?;

        let mut notifications = self.peripheral.notifications().await?;
        self.is_listening.store(true, Ordering::SeqCst);

        let codec = self.codec;
        let sample_tx = self.sample_tx.clone();
        let is_listening = self.is_listening.clone();

        let handle = tokio::spawn(async move {
            debug!("Sensor data listener started");
            while is_listening.load(Ordering::SeqCst) {
                match notifications.next().await {
                    Some(notification) => {
                        if let Some(sample) =
                            decode_notification(&codec, notification.uuid, &notification.value)
                        {
                            let _ = sample_tx.send(sample);
                        }
                    }
                    None => {
                        error!("Notification stream ended");
                        break;
                    }
                }
            }
            is_listening.store(false, Ordering::SeqCst);
            debug!("Sensor data listener stopped");
        });

        *self.listener_handle.write() = Some(handle);
        info!("Subscribed to sensor data notifications");

        Ok(())
    }

    /// Disable notifications and stop the listener.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.is_listening.store(false, Ordering::SeqCst);
        if let Some(handle) = self.listener_handle.write().take() {
            handle.abort();
        }

        self.write_notification_state(NotificationState::Disabled).await?;
        debug!("Unsubscribed from sensor data notifications");

        Ok(())
    }

    /// Receive samples pushed by the wearable.
    pub fn samples(&self) -> broadcast::Receiver<Sample> {
        self.sample_tx.subscribe()
    }

    /// Check if the notification listener is running.
    pub fn is_subscribed(&self) -> bool {
        self.is_listening.load(Ordering::SeqCst)
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        self.is_listening.store(false, Ordering::SeqCst);
        if let Some(handle) = self.listener_handle.write().take() {
            handle.abort();
        }
    }
}

/// Find the telemetry configuration descriptor of a characteristic.
fn config_descriptor(characteristic: &Characteristic) -> Result<Descriptor> {
    characteristic
        .descriptors
        .iter()
        .find(|d| d.uuid == CLIENT_CONFIG_UUID)
        .cloned()
        .ok_or_else(|| Error::DescriptorNotFound {
            uuid: CLIENT_CONFIG_UUID.to_string(),
        })
}

/// Decode a notification if it came from the sensor data characteristic.
fn decode_notification(codec: &SampleCodec, uuid: Uuid, value: &[u8]) -> Option<Sample> {
    if uuid != SENSOR_DATA_UUID {
        trace!("Ignoring notification from {}", uuid);
        return None;
    }

    match codec.decode(value) {
        Ok(sample) => Some(sample),
        Err(e) => {
            warn!("Undecodable sensor notification {}: {}", hex_preview(value), e);
            None
        }
    }
}
