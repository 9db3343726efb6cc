//! One-shot payload sender.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::channel::{with_deadline, Channel, ChannelTransport};
use crate::error::{Error, Result};
use crate::peer::PeerId;
use crate::utils::hex_preview;

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// The peer that received the payload.
    pub peer: PeerId,
    /// The channel used.
    pub channel_id: u64,
    /// Payload bytes written.
    pub bytes: usize,
}

/// Sends whole payloads to the single paired peer.
///
/// Every send opens a fresh channel under the configured path, writes the
/// payload, and releases the stream and the channel whether or not the
/// write succeeded.
pub struct TelemetrySender {
    transport: Arc<dyn ChannelTransport>,
    path: String,
    timeout: Option<Duration>,
}

impl TelemetrySender {
    /// Create a sender for channels under `path`.
    pub fn new(transport: Arc<dyn ChannelTransport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
            timeout: None,
        }
    }

    /// Bound each write with a deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The channel path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve the one reachable peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousPeer`] unless exactly one peer is
    /// reachable.
    pub async fn resolve_peer(&self) -> Result<PeerId> {
        let peers = self.transport.connected_peers().await?;
        match <[PeerId; 1]>::try_from(peers) {
            Ok([peer]) => Ok(peer),
            Err(peers) => {
                warn!("Cannot pick a transfer target among {} peers", peers.len());
                Err(Error::AmbiguousPeer { found: peers.len() })
            }
        }
    }

    /// Send a payload over a new channel.
    ///
    /// # Arguments
    ///
    /// * `payload` - Bytes to deliver, typically a bulk buffer's contents
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousPeer`] before any channel is opened if the
    /// peer cannot be resolved, or [`Error::TransferFailed`] if the stream
    /// fails. The channel is closed on every path once it is open.
    pub async fn send(&self, payload: &[u8]) -> Result<TransferReport> {
        let peer = self.resolve_peer().await?;
        let channel = self.transport.open_channel(&peer, &self.path).await?;
        info!("Opened channel {} for {} bytes", channel, payload.len());
        debug!("Payload: {}", hex_preview(payload));

        let written = self.write_payload(&channel, payload).await;

        if let Err(e) = self.transport.close_channel(&channel).await {
            warn!("Failed to close channel {}: {}", channel, e);
        }

        written?;
        info!("Sent {} bytes to {}", payload.len(), peer);

        Ok(TransferReport {
            peer,
            channel_id: channel.id(),
            bytes: payload.len(),
        })
    }

    async fn write_payload(&self, channel: &Channel, payload: &[u8]) -> Result<()> {
        let mut stream = self.transport.output_stream(channel).await?;

        let written = with_deadline(self.timeout, "write", async {
            stream
                .write_all(payload)
                .await
                .map_err(|e| Error::transfer("write", e))?;
            stream.flush().await.map_err(|e| Error::transfer("flush", e))
        })
        .await;

        let closed = stream
            .close()
            .await
            .map_err(|e| Error::transfer("close stream", e));

        written.and(closed)
    }
}
