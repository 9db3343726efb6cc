//! Channel receiver.
//!
//! Each channel a peer opens against this endpoint is drained on its own
//! task, so a stalled peer only stalls its own worker.

use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::channel::{with_deadline, Channel, ChannelEvent, ChannelReader, ChannelTransport};
use crate::data::Sample;
use crate::error::{Error, Result};
use crate::peer::PeerId;
use crate::protocol::SampleCodec;

/// Default scratch window for each read call.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Samples decoded from one inbound transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedBatch {
    /// The sending peer.
    pub peer: PeerId,
    /// The channel the batch arrived on.
    pub channel_id: u64,
    /// Decoded samples in arrival order.
    pub samples: Vec<Sample>,
}

/// Accumulates inbound channel streams and decodes them as bulk payloads.
pub struct TelemetryReceiver {
    transport: Arc<dyn ChannelTransport>,
    codec: SampleCodec,
    path: String,
    chunk_size: usize,
    timeout: Option<Duration>,
    batch_tx: broadcast::Sender<ReceivedBatch>,
}

impl TelemetryReceiver {
    /// Create a receiver accepting channels under `path`.
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        codec: SampleCodec,
        path: impl Into<String>,
    ) -> Self {
        let (batch_tx, _) = broadcast::channel(16);

        Self {
            transport,
            codec,
            path: path.into(),
            chunk_size: DEFAULT_READ_CHUNK_SIZE,
            timeout: None,
            batch_tx,
        }
    }

    /// Set the scratch window size. Zero is treated as one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Bound each read with a deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Subscribe to decoded batches.
    pub fn batches(&self) -> broadcast::Receiver<ReceivedBatch> {
        self.batch_tx.subscribe()
    }

    /// Read a channel to end-of-stream.
    ///
    /// The stream and the channel are each closed exactly once, whether
    /// the read loop finished or failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransferFailed`] if a read fails or times out.
    pub async fn receive(&self, channel: &Channel) -> Result<Bytes> {
        let result = match self.transport.input_stream(channel).await {
            Ok(mut stream) => {
                let result = self.read_to_end(stream.as_mut()).await;
                if let Err(e) = stream.close().await {
                    warn!("Failed to close input stream on {}: {}", channel, e);
                }
                result
            }
            Err(e) => Err(e),
        };

        if let Err(e) = self.transport.close_channel(channel).await {
            warn!("Failed to close channel {}: {}", channel, e);
        }

        result
    }

    /// Receive a channel and decode its payload.
    ///
    /// # Errors
    ///
    /// Returns the transfer error, or a framing error if the payload is not
    /// a whole number of records.
    pub async fn receive_batch(&self, channel: &Channel) -> Result<ReceivedBatch> {
        let payload = self.receive(channel).await?;
        info!("Received {} bytes on {}", payload.len(), channel);

        let samples = self.codec.decode_bulk(&payload)?;
        Ok(ReceivedBatch {
            peer: channel.peer().clone(),
            channel_id: channel.id(),
            samples,
        })
    }

    /// Start a worker for a newly opened channel.
    ///
    /// A channel under another path is closed without being read.
    pub fn on_channel_opened(self: &Arc<Self>, channel: Channel) -> JoinHandle<()> {
        let receiver = Arc::clone(self);

        if channel.path() != self.path {
            warn!("Rejecting channel {} with unexpected path", channel);
            return tokio::spawn(async move {
                if let Err(e) = receiver.transport.close_channel(&channel).await {
                    warn!("Failed to close channel {}: {}", channel, e);
                }
            });
        }

        tokio::spawn(async move {
            match receiver.receive_batch(&channel).await {
                Ok(batch) => {
                    debug!("Decoded {} samples from {}", batch.samples.len(), channel);
                    if receiver.batch_tx.send(batch).is_err() {
                        debug!("No batch listeners");
                    }
                }
                Err(e) => error!("Receive on {} failed: {}", channel, e),
            }
        })
    }

    /// Dispatch one transport event.
    pub fn handle_event(self: &Arc<Self>, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened(channel) => {
                self.on_channel_opened(channel);
            }
            ChannelEvent::Closed(channel) => debug!("Channel {} closed", channel),
        }
    }

    async fn read_to_end(&self, stream: &mut dyn ChannelReader) -> Result<Bytes> {
        let mut scratch = vec![0u8; self.chunk_size];
        let mut accumulated = BytesMut::new();

        loop {
            let read = with_deadline(self.timeout, "read", async {
                stream
                    .read(&mut scratch)
                    .await
                    .map_err(|e| Error::transfer("read", e))
            })
            .await?;

            if read == 0 {
                break;
            }
            trace!("Read chunk of {} bytes", read);
            accumulated.extend_from_slice(&scratch[..read]);
        }

        Ok(accumulated.freeze())
    }
}
