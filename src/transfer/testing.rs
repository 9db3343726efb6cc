//! Scripted transport for transfer tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::channel::{Channel, ChannelReader, ChannelTransport, ChannelWriter};
use crate::error::{Error, Result};
use crate::peer::PeerId;

#[derive(Default)]
pub(crate) struct Counters {
    pub opened: AtomicUsize,
    pub channel_closes: AtomicUsize,
    pub stream_closes: AtomicUsize,
}

impl Counters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn channel_closes(&self) -> usize {
        self.channel_closes.load(Ordering::SeqCst)
    }

    pub fn stream_closes(&self) -> usize {
        self.stream_closes.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedTransport {
    peers: Vec<PeerId>,
    reads: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    fail_writes: bool,
    pub written: Arc<Mutex<Vec<u8>>>,
    pub counters: Arc<Counters>,
}

impl ScriptedTransport {
    pub fn new(peers: &[&str]) -> Self {
        Self {
            peers: peers.iter().map(|p| PeerId::from(*p)).collect(),
            reads: Mutex::new(VecDeque::new()),
            fail_writes: false,
            written: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_reads(self, reads: Vec<io::Result<Vec<u8>>>) -> Self {
        *self.reads.lock() = reads.into();
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

struct RecordingWriter {
    written: Arc<Mutex<Vec<u8>>>,
    fail: bool,
    counters: Arc<Counters>,
}

#[async_trait]
impl ChannelWriter for RecordingWriter {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        self.written.lock().extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.counters.stream_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedReader {
    reads: VecDeque<io::Result<Vec<u8>>>,
    counters: Arc<Counters>,
}

#[async_trait]
impl ChannelReader for ScriptedReader {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(Ok(chunk)) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.counters.stream_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for ScriptedTransport {
    async fn connected_peers(&self) -> Result<Vec<PeerId>> {
        Ok(self.peers.clone())
    }

    async fn open_channel(&self, peer: &PeerId, path: &str) -> Result<Channel> {
        let id = self.counters.opened.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(Channel::new(id, peer.clone(), path))
    }

    async fn output_stream(&self, _channel: &Channel) -> Result<Box<dyn ChannelWriter>> {
        Ok(Box::new(RecordingWriter {
            written: self.written.clone(),
            fail: self.fail_writes,
            counters: self.counters.clone(),
        }))
    }

    async fn input_stream(&self, _channel: &Channel) -> Result<Box<dyn ChannelReader>> {
        let reads = std::mem::take(&mut *self.reads.lock());
        if reads.is_empty() {
            return Err(Error::TransferFailed {
                reason: "no input scripted".to_string(),
            });
        }
        Ok(Box::new(ScriptedReader {
            reads,
            counters: self.counters.clone(),
        }))
    }

    async fn close_channel(&self, _channel: &Channel) -> Result<()> {
        self.counters.channel_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
