//! In-memory loopback transport.
//!
//! [`MemoryTransport::pair`] links two endpoints so that a channel opened
//! on one side is announced to the other through a [`ChannelEvent`], with
//! bytes flowing over a `tokio::io::duplex` pipe.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::channel::{
    Channel, ChannelEvent, ChannelReader, ChannelTransport, ChannelWriter, StreamReader,
    StreamWriter,
};
use crate::error::{Error, Result};
use crate::peer::PeerId;

/// Pipe capacity per channel.
const PIPE_CAPACITY: usize = 64 * 1024;

/// One side of the link.
struct Endpoint {
    id: PeerId,
    streams: Mutex<HashMap<u64, DuplexStream>>,
    events_tx: mpsc::Sender<ChannelEvent>,
}

/// State shared by both sides.
struct Link {
    next_channel: AtomicU64,
    connected: AtomicBool,
}

/// One endpoint of an in-memory link.
pub struct MemoryTransport {
    local: Arc<Endpoint>,
    remote: Arc<Endpoint>,
    link: Arc<Link>,
    events_rx: Mutex<Option<mpsc::Receiver<ChannelEvent>>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl MemoryTransport {
    /// Create two linked endpoints named `a` and `b`.
    pub fn pair(a: impl Into<PeerId>, b: impl Into<PeerId>) -> (Arc<Self>, Arc<Self>) {
        let (a_tx, a_rx) = mpsc::channel(16);
        let (b_tx, b_rx) = mpsc::channel(16);

        let a = Arc::new(Endpoint {
            id: a.into(),
            streams: Mutex::new(HashMap::new()),
            events_tx: a_tx,
        });
        let b = Arc::new(Endpoint {
            id: b.into(),
            streams: Mutex::new(HashMap::new()),
            events_tx: b_tx,
        });
        let link = Arc::new(Link {
            next_channel: AtomicU64::new(1),
            connected: AtomicBool::new(true),
        });

        let side_a = Arc::new(Self {
            local: a.clone(),
            remote: b.clone(),
            link: link.clone(),
            events_rx: Mutex::new(Some(a_rx)),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        });
        let side_b = Arc::new(Self {
            local: b,
            remote: a,
            link,
            events_rx: Mutex::new(Some(b_rx)),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        });

        (side_a, side_b)
    }

    /// This endpoint's peer ID.
    pub fn local_id(&self) -> &PeerId {
        &self.local.id
    }

    /// Take the stream of channel events for this endpoint.
    ///
    /// Returns `None` once taken.
    pub fn take_events(&self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.events_rx.lock().take()
    }

    /// Drop the link; both sides stop seeing each other.
    pub fn disconnect(&self) {
        self.link.connected.store(false, Ordering::SeqCst);
        debug!("Link {} <-> {} disconnected", self.local.id, self.remote.id);
    }

    /// Restore the link.
    pub fn reconnect(&self) {
        self.link.connected.store(true, Ordering::SeqCst);
    }

    /// Channels opened by this endpoint.
    pub fn channels_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Channels closed by this endpoint.
    pub fn channels_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn take_stream(&self, channel: &Channel) -> Result<DuplexStream> {
        self.local
            .streams
            .lock()
            .remove(&channel.id())
            .ok_or_else(|| Error::TransferFailed {
                reason: format!("no stream available on channel {}", channel),
            })
    }
}

#[async_trait]
impl ChannelTransport for MemoryTransport {
    async fn connected_peers(&self) -> Result<Vec<PeerId>> {
        if self.link.connected.load(Ordering::SeqCst) {
            Ok(vec![self.remote.id.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn open_channel(&self, peer: &PeerId, path: &str) -> Result<Channel> {
        if !self.link.connected.load(Ordering::SeqCst) || *peer != self.remote.id {
            return Err(Error::TransferFailed {
                reason: format!("peer {} is not reachable", peer),
            });
        }

        let id = self.link.next_channel.fetch_add(1, Ordering::SeqCst);
        let (outbound, inbound) = tokio::io::duplex(PIPE_CAPACITY);
        self.local.streams.lock().insert(id, outbound);
        self.remote.streams.lock().insert(id, inbound);
        self.opened.fetch_add(1, Ordering::SeqCst);

        let announced = Channel::new(id, self.local.id.clone(), path);
        if let Err(e) = self
            .remote
            .events_tx
            .try_send(ChannelEvent::Opened(announced))
        {
            warn!("{} missed channel {}: {}", self.remote.id, id, e);
            self.remote.streams.lock().remove(&id);
        }

        Ok(Channel::new(id, peer.clone(), path))
    }

    async fn output_stream(&self, channel: &Channel) -> Result<Box<dyn ChannelWriter>> {
        Ok(Box::new(StreamWriter::new(self.take_stream(channel)?)))
    }

    async fn input_stream(&self, channel: &Channel) -> Result<Box<dyn ChannelReader>> {
        Ok(Box::new(StreamReader::new(self.take_stream(channel)?)))
    }

    async fn close_channel(&self, channel: &Channel) -> Result<()> {
        // Drops the stream if it was never taken.
        self.local.streams.lock().remove(&channel.id());
        self.closed.fetch_add(1, Ordering::SeqCst);
        debug!("{} closed channel {}", self.local.id, channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peers_follow_link_state() {
        let (watch, phone) = MemoryTransport::pair("watch", "phone");
        assert_eq!(watch.connected_peers().await.unwrap(), vec![PeerId::from("phone")]);
        assert_eq!(phone.connected_peers().await.unwrap(), vec![PeerId::from("watch")]);

        watch.disconnect();
        assert!(phone.connected_peers().await.unwrap().is_empty());

        phone.reconnect();
        assert_eq!(watch.connected_peers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_announces_to_remote() {
        let (watch, phone) = MemoryTransport::pair("watch", "phone");
        let mut events = phone.take_events().unwrap();
        assert!(phone.take_events().is_none());

        let channel = watch
            .open_channel(&PeerId::from("phone"), "/telemetry")
            .await
            .unwrap();
        assert_eq!(channel.peer(), &PeerId::from("phone"));

        match events.recv().await.unwrap() {
            ChannelEvent::Opened(remote) => {
                assert_eq!(remote.id(), channel.id());
                assert_eq!(remote.peer(), &PeerId::from("watch"));
                assert_eq!(remote.path(), "/telemetry");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(watch.channels_opened(), 1);
    }

    #[tokio::test]
    async fn test_bytes_flow_to_remote() {
        let (watch, phone) = MemoryTransport::pair("watch", "phone");
        let mut events = phone.take_events().unwrap();

        let channel = watch
            .open_channel(&PeerId::from("phone"), "/telemetry")
            .await
            .unwrap();
        let mut writer = watch.output_stream(&channel).await.unwrap();
        writer.write_all(b"sensor bytes").await.unwrap();
        writer.close().await.unwrap();

        let ChannelEvent::Opened(remote) = events.recv().await.unwrap() else {
            panic!("expected an open event");
        };
        let mut reader = phone.input_stream(&remote).await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"sensor bytes");
    }

    #[tokio::test]
    async fn test_stream_taken_once() {
        let (watch, _phone) = MemoryTransport::pair("watch", "phone");
        let channel = watch
            .open_channel(&PeerId::from("phone"), "/telemetry")
            .await
            .unwrap();

        assert!(watch.output_stream(&channel).await.is_ok());
        assert!(watch.output_stream(&channel).await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_peer() {
        let (watch, _phone) = MemoryTransport::pair("watch", "phone");
        assert!(watch
            .open_channel(&PeerId::from("tablet"), "/telemetry")
            .await
            .is_err());

        watch.disconnect();
        assert!(watch
            .open_channel(&PeerId::from("phone"), "/telemetry")
            .await
            .is_err());
        assert_eq!(watch.channels_opened(), 0);
    }

    #[tokio::test]
    async fn test_undelivered_open_drops_remote_stream() {
        let (watch, phone) = MemoryTransport::pair("watch", "phone");
        drop(phone.take_events());

        watch
            .open_channel(&PeerId::from("phone"), "/telemetry")
            .await
            .unwrap();
        assert!(phone.local.streams.lock().is_empty());
        assert_eq!(watch.local.streams.lock().len(), 1);
    }
}
