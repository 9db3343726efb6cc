//! Companion (consumer) role.
//!
//! Listens for channels opened by the wearable and republishes each
//! decoded batch.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::ServiceCommand;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::transfer::{ChannelEvent, ChannelTransport, ReceivedBatch, TelemetryReceiver};

type EventSlot = Arc<Mutex<Option<mpsc::Receiver<ChannelEvent>>>>;

/// The consumer side of a pairing.
pub struct CompanionService {
    config: SyncConfig,
    receiver: Arc<TelemetryReceiver>,
    events: EventSlot,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
    is_running: Arc<AtomicBool>,
}

impl CompanionService {
    /// Create a companion service.
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint settings
    /// * `transport` - Channel transport to the wearable
    /// * `events` - Channel events raised by `transport`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the configuration does not
    /// validate.
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn ChannelTransport>,
        events: mpsc::Receiver<ChannelEvent>,
    ) -> Result<Self> {
        config.validate()?;

        let receiver = TelemetryReceiver::new(transport, config.codec(), config.channel_path.clone())
            .with_chunk_size(config.read_chunk_size)
            .with_timeout(config.transfer_timeout);

        Ok(Self {
            config,
            receiver: Arc::new(receiver),
            events: Arc::new(Mutex::new(Some(events))),
            shutdown_tx: Mutex::new(None),
            listener_handle: Mutex::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The channel receiver.
    pub fn receiver(&self) -> &Arc<TelemetryReceiver> {
        &self.receiver
    }

    /// Subscribe to decoded batches.
    pub fn batches(&self) -> broadcast::Receiver<ReceivedBatch> {
        self.receiver.batches()
    }

    /// Check if the listener is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Start accepting channels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the event stream is unavailable.
    pub fn start(&self) -> Result<()> {
        if self.is_running() {
            debug!("Companion already listening");
            return Ok(());
        }

        let mut events = self
            .events
            .lock()
            .take()
            .ok_or_else(|| Error::Internal("channel event stream unavailable".to_string()))?;

        info!("Companion listening on {}", self.config.channel_path);
        self.is_running.store(true, Ordering::SeqCst);

        let receiver = self.receiver.clone();
        let slot = self.events.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    event = events.recv() => match event {
                        Some(event) => receiver.handle_event(event),
                        None => {
                            warn!("Channel event stream closed");
                            break;
                        }
                    },
                }
            }

            *slot.lock() = Some(events);
            is_running.store(false, Ordering::SeqCst);
            debug!("Companion listener ended");
        });

        *self.shutdown_tx.lock() = Some(shutdown_tx);
        *self.listener_handle.lock() = Some(handle);
        Ok(())
    }

    /// Stop accepting channels. Transfers already in flight finish.
    pub async fn stop(&self) {
        let shutdown_tx = self.shutdown_tx.lock().take();
        let handle = self.listener_handle.lock().take();
        if handle.is_none() {
            return;
        }

        info!("Stopping companion listener");
        if let Some(tx) = shutdown_tx {
            // The listener may already have ended on its own
            let _ = tx.send(());
        }
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Apply an external command.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`start`](Self::start).
    pub async fn handle_command(&self, command: ServiceCommand) -> Result<()> {
        debug!("Handling command {}", command);
        match command {
            ServiceCommand::StartService | ServiceCommand::Receive => self.start(),
            ServiceCommand::StopService => {
                self.stop().await;
                Ok(())
            }
            ServiceCommand::Send => {
                warn!("Companion has no batch to send");
                Ok(())
            }
        }
    }
}

impl Drop for CompanionService {
    fn drop(&mut self) {
        if let Some(handle) = self.listener_handle.lock().take() {
            handle.abort();
        }
    }
}
