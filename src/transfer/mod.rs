//! Single-shot channel transfers.
//!
//! A sender pushes one payload per channel to the paired peer; the
//! receiving side drains each opened channel to end-of-stream and decodes
//! the bytes as a bulk sample payload.

pub mod channel;
pub mod memory;
pub mod receiver;
pub mod sender;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{
    Channel, ChannelEvent, ChannelReader, ChannelTransport, ChannelWriter, StreamReader,
    StreamWriter,
};
pub use memory::MemoryTransport;
pub use receiver::{ReceivedBatch, TelemetryReceiver, DEFAULT_READ_CHUNK_SIZE};
pub use sender::{TelemetrySender, TransferReport};
