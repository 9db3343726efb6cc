//! Wearable (producer) role.
//!
//! Collects samples into the bulk buffer, serves the telemetry GATT
//! attributes, and ships each full batch to the paired companion.

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ble::{DispatchOutcome, GattEvent, SubscriptionRegistry, TelemetryGattServer};
use crate::command::ServiceCommand;
use crate::config::SyncConfig;
use crate::data::{BulkSampleBuffer, Sample, SampleSource};
use crate::error::Result;
use crate::transfer::{ChannelTransport, TelemetrySender, TransferReport};

/// The producer side of a pairing.
pub struct WearableService {
    /// Active configuration.
    config: SyncConfig,
    /// Current batch.
    buffer: Arc<BulkSampleBuffer>,
    /// GATT attribute server.
    server: Arc<TelemetryGattServer>,
    /// Bulk batch sender.
    sender: Arc<TelemetrySender>,
    /// Periodic notification task.
    notifier_handle: RwLock<Option<JoinHandle<()>>>,
    /// Running flag.
    is_running: Arc<AtomicBool>,
}

impl WearableService {
    /// Create a wearable service.
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint settings
    /// * `source` - Provides the sample served on reads and notifications
    /// * `transport` - Channel transport to the companion
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`](crate::Error::InvalidParameter)
    /// if the configuration does not validate.
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SampleSource>,
        transport: Arc<dyn ChannelTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let codec = config.codec();
        let buffer = BulkSampleBuffer::new(codec, config.capacity_samples);
        let server = TelemetryGattServer::new(Arc::new(SubscriptionRegistry::new()), source, codec);
        let sender = TelemetrySender::new(transport, config.channel_path.clone())
            .with_timeout(config.transfer_timeout);

        Ok(Self {
            config,
            buffer: Arc::new(buffer),
            server: Arc::new(server),
            sender: Arc::new(sender),
            notifier_handle: RwLock::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The current batch.
    pub fn buffer(&self) -> &Arc<BulkSampleBuffer> {
        &self.buffer
    }

    /// The GATT server.
    pub fn server(&self) -> &Arc<TelemetryGattServer> {
        &self.server
    }

    /// The subscription registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.server.registry()
    }

    /// Check if the service is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Start the service.
    ///
    /// Full batches are sent automatically while running, and periodic
    /// notifications start if an interval is configured.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            debug!("Wearable service already running");
            return;
        }

        info!("Starting wearable service");
        if let Some(interval) = self.config.notification_interval {
            let handle = self.server.dispatcher().spawn_periodic(interval);
            *self.notifier_handle.write() = Some(handle);
        }
    }

    /// Stop the service. The current batch is kept.
    pub fn stop(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping wearable service");
        if let Some(handle) = self.notifier_handle.write().take() {
            handle.abort();
        }
    }

    /// Process GATT events from the radio stack until the sender closes.
    pub fn serve(&self, events: mpsc::Receiver<GattEvent>) -> JoinHandle<()> {
        self.server.clone().spawn(events)
    }

    /// Apply an external command.
    ///
    /// Returns the transfer task for [`ServiceCommand::Send`].
    pub fn handle_command(&self, command: ServiceCommand) -> Option<JoinHandle<()>> {
        debug!("Handling command {}", command);
        match command {
            ServiceCommand::StartService => self.start(),
            ServiceCommand::StopService => self.stop(),
            ServiceCommand::Send => return Some(self.spawn_send(self.buffer.valid_bytes())),
            ServiceCommand::Receive => warn!("Wearable does not accept inbound channels"),
        }
        None
    }

    /// Apply an action string; unknown actions are ignored.
    pub fn handle_action(&self, action: &str) -> Option<JoinHandle<()>> {
        ServiceCommand::parse(action).and_then(|command| self.handle_command(command))
    }

    /// Add a sample to the current batch.
    ///
    /// Returns true if the batch is now full. While running, the batch this
    /// sample completed is sent in the background.
    pub fn record_sample(&self, sample: &Sample) -> bool {
        match self.buffer.push_sample_and_capture(sample) {
            Some(batch) => {
                if self.is_running() {
                    debug!("Batch full, sending {} bytes", batch.len());
                    self.spawn_send(batch);
                }
                true
            }
            None => false,
        }
    }

    /// Push the current sample to every subscriber.
    pub fn notify_subscribers(&self) -> Result<DispatchOutcome> {
        self.server.dispatcher().dispatch()
    }

    /// Send the current batch and wait for the result.
    ///
    /// The batch is left intact whether or not the transfer succeeds.
    pub async fn send_now(&self) -> Result<TransferReport> {
        self.sender.send(&self.buffer.valid_bytes()).await
    }

    fn spawn_send(&self, payload: Bytes) -> JoinHandle<()> {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            match sender.send(&payload).await {
                Ok(report) => info!(
                    "Batch of {} bytes delivered to {}",
                    report.bytes, report.peer
                ),
                Err(e) => error!("Batch transfer failed: {}", e),
            }
        })
    }
}

impl Drop for WearableService {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.notifier_handle.write().take() {
            handle.abort();
        }
    }
}
