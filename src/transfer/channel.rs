//! Byte-stream channel abstraction.
//!
//! A [`ChannelTransport`] resolves peers and opens one-shot channels to
//! them. Each channel yields at most one writable or readable stream,
//! which is closed explicitly once the transfer ends.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::peer::PeerId;

/// A transient byte pipe to one peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    id: u64,
    peer: PeerId,
    path: String,
}

impl Channel {
    /// Create a channel handle.
    pub fn new(id: u64, peer: PeerId, path: impl Into<String>) -> Self {
        Self {
            id,
            peer,
            path: path.into(),
        }
    }

    /// Transport-assigned channel ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The peer at the other end.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Topic label the channel was opened under.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({})", self.id, self.path, self.peer)
    }
}

/// Channel lifecycle events reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A peer opened a channel against this endpoint.
    Opened(Channel),
    /// A channel was closed by the transport.
    Closed(Channel),
}

/// Writable half of a channel.
#[async_trait]
pub trait ChannelWriter: Send {
    /// Write the whole buffer.
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Flush buffered bytes to the peer.
    async fn flush(&mut self) -> io::Result<()>;

    /// Close the stream, signalling end-of-stream to the reader.
    async fn close(&mut self) -> io::Result<()>;
}

/// Readable half of a channel.
#[async_trait]
pub trait ChannelReader: Send {
    /// Read into `buf`, returning 0 at end-of-stream.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Close the stream.
    async fn close(&mut self) -> io::Result<()>;
}

/// Peer resolution and channel management.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Peers currently reachable through this transport.
    async fn connected_peers(&self) -> Result<Vec<PeerId>>;

    /// Open a channel to `peer` under `path`.
    async fn open_channel(&self, peer: &PeerId, path: &str) -> Result<Channel>;

    /// Writable stream for a channel this endpoint opened.
    async fn output_stream(&self, channel: &Channel) -> Result<Box<dyn ChannelWriter>>;

    /// Readable stream for a channel a peer opened.
    async fn input_stream(&self, channel: &Channel) -> Result<Box<dyn ChannelReader>>;

    /// Release a channel.
    async fn close_channel(&self, channel: &Channel) -> Result<()>;
}

/// [`ChannelWriter`] over any tokio [`AsyncWrite`].
#[derive(Debug)]
pub struct StreamWriter<W> {
    inner: W,
}

impl<W> StreamWriter<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ChannelWriter for StreamWriter<W> {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

/// [`ChannelReader`] over any tokio [`AsyncRead`].
///
/// Reads after [`close`](ChannelReader::close) report end-of-stream.
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
    closed: bool,
}

impl<R> StreamReader<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            closed: false,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ChannelReader for StreamReader<R> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        self.inner.read(buf).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Run one stream operation under an optional deadline.
pub(crate) async fn with_deadline<T, F>(limit: Option<Duration>, context: &str, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| Error::TransferFailed {
                reason: format!("{}: timed out after {:?}", context, limit),
            })?,
        None => op.await,
    }
}
