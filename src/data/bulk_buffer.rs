//! Bounded bulk sample buffer.
//!
//! Accumulates encoded records into a fixed-capacity byte region until a
//! batch is full. The push that arrives after a full batch clears the
//! region first and becomes record 0 of the next batch.

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::data::Sample;
use crate::protocol::SampleCodec;

/// Default number of samples per batch.
pub const DEFAULT_CAPACITY_SAMPLES: usize = 30;

struct BufferState {
    storage: Vec<u8>,
    count: usize,
}

/// Fixed-capacity accumulator of encoded sample records.
///
/// Bytes `[0, len() * record_size())` always hold `len()` valid records in
/// push order. The whole push (including the overflow reset) runs under a
/// single lock, so concurrent pushes never lose a record or tear the
/// cursor.
pub struct BulkSampleBuffer {
    codec: SampleCodec,
    capacity_samples: usize,
    state: Mutex<BufferState>,
}

impl BulkSampleBuffer {
    /// Create an empty buffer holding `capacity_samples` records.
    pub fn new(codec: SampleCodec, capacity_samples: usize) -> Self {
        let size = capacity_samples * codec.record_size();
        Self {
            codec,
            capacity_samples,
            state: Mutex::new(BufferState {
                storage: vec![0; size],
                count: 0,
            }),
        }
    }

    /// Push one encoded record.
    ///
    /// Returns `true` when this push made the batch full. A record whose
    /// length is not the codec's record width is dropped with a warning and
    /// the cursor does not move.
    pub fn push(&self, record: &[u8]) -> bool {
        if !self.accepts(record) {
            return false;
        }
        let mut state = self.state.lock();
        self.write_record(&mut state, record)
    }

    /// Encode a sample with this buffer's codec and push it.
    pub fn push_sample(&self, sample: &Sample) -> bool {
        self.push(&self.codec.encode(sample))
    }

    /// Push one encoded record and, if it completed the batch, return the
    /// batch bytes.
    ///
    /// The returned bytes are copied under the same lock as the push, so a
    /// concurrent push cannot reset the batch before it is captured.
    pub fn push_and_capture(&self, record: &[u8]) -> Option<Bytes> {
        if !self.accepts(record) {
            return None;
        }
        let mut state = self.state.lock();
        if self.write_record(&mut state, record) {
            Some(Bytes::copy_from_slice(&state.storage))
        } else {
            None
        }
    }

    /// Encode a sample and push it with [`push_and_capture`](Self::push_and_capture).
    pub fn push_sample_and_capture(&self, sample: &Sample) -> Option<Bytes> {
        self.push_and_capture(&self.codec.encode(sample))
    }

    fn accepts(&self, record: &[u8]) -> bool {
        let record_size = self.codec.record_size();
        if record.len() != record_size {
            warn!(
                "Dropping record of {} bytes, expected {}",
                record.len(),
                record_size
            );
            return false;
        }
        true
    }

    fn write_record(&self, state: &mut BufferState, record: &[u8]) -> bool {
        let record_size = self.codec.record_size();

        if state.count == self.capacity_samples {
            debug!("Batch of {} samples complete, starting a new one", state.count);
            state.storage.fill(0);
            state.count = 0;
        }

        if state.count < self.capacity_samples {
            let offset = state.count * record_size;
            state.storage[offset..offset + record_size].copy_from_slice(record);
            state.count += 1;
            trace!("Pushed record {} of {}", state.count, self.capacity_samples);
        }

        state.count == self.capacity_samples
    }

    /// Raw storage, including zero bytes past the last valid record.
    ///
    /// The length is always `capacity() * record_size()`. Pair with
    /// [`len`](Self::len) or use [`valid_bytes`](Self::valid_bytes) to get
    /// only the filled records.
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.state.lock().storage)
    }

    /// The filled prefix of the storage.
    pub fn valid_bytes(&self) -> Bytes {
        let state = self.state.lock();
        Bytes::copy_from_slice(&state.storage[..state.count * self.codec.record_size()])
    }

    /// Decode the valid records.
    pub fn samples(&self) -> Vec<Sample> {
        // valid_bytes is always a whole number of records
        self.codec
            .decode_bulk(&self.valid_bytes())
            .unwrap_or_default()
    }

    /// Number of valid records.
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    /// Check if the buffer holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the current batch is full.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity_samples
    }

    /// Batch capacity in records.
    pub fn capacity(&self) -> usize {
        self.capacity_samples
    }

    /// Width of one record in bytes.
    pub fn record_size(&self) -> usize {
        self.codec.record_size()
    }

    /// The codec used by [`push_sample`](Self::push_sample).
    pub fn codec(&self) -> SampleCodec {
        self.codec
    }

    /// Zero the storage and rewind the cursor.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.storage.fill(0);
        state.count = 0;
        debug!("Bulk buffer reset");
    }
}

impl Default for BulkSampleBuffer {
    fn default() -> Self {
        Self::new(SampleCodec::default(), DEFAULT_CAPACITY_SAMPLES)
    }
}

impl std::fmt::Debug for BulkSampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkSampleBuffer")
            .field("schema", &self.codec.schema())
            .field("capacity_samples", &self.capacity_samples)
            .field("count", &self.len())
            .finish()
    }
}
