//! Fixed-width binary sample codec.
//!
//! Record layout (big-endian, no framing, no length prefix):
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬──────────────────┐
//! │ timestamp    │ EDA          │ skin temp    │ heart rate       │
//! │ i64 (8B)     │ f64 (8B)     │ f64 (8B)     │ f64 (8B, opt.)   │
//! └──────────────┴──────────────┴──────────────┴──────────────────┘
//! ```
//!
//! The schema is implicit in the record width: 24 bytes without heart
//! rate, 32 bytes with it. Both peers must be configured with the same
//! [`SampleSchema`]. A bulk payload is the plain concatenation of records.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::data::Sample;
use crate::error::{Error, Result};

/// Bit pattern written when a heart rate slot has no reading.
pub const HEART_RATE_ABSENT_BITS: u64 = 0x7FF8_0000_0000_0000;

/// Which fields a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleSchema {
    /// Timestamp, EDA and skin temperature (24 bytes).
    #[default]
    Basic,
    /// Basic fields followed by heart rate (32 bytes).
    WithHeartRate,
}

impl SampleSchema {
    /// Width in bytes of one encoded record.
    pub const fn record_size(&self) -> usize {
        match self {
            Self::Basic => 24,
            Self::WithHeartRate => 32,
        }
    }

    /// Check if records carry a heart rate field.
    pub const fn has_heart_rate(&self) -> bool {
        matches!(self, Self::WithHeartRate)
    }

    /// Look up the schema for a record width.
    pub fn from_record_size(size: usize) -> Option<Self> {
        match size {
            24 => Some(Self::Basic),
            32 => Some(Self::WithHeartRate),
            _ => None,
        }
    }
}

impl std::fmt::Display for SampleSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic ({} bytes)", self.record_size()),
            Self::WithHeartRate => write!(f, "with-heart-rate ({} bytes)", self.record_size()),
        }
    }
}

/// Encoder/decoder bound to one [`SampleSchema`].
///
/// The codec performs no validation of numeric values: NaN and
/// infinities pass through bit-for-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleCodec {
    schema: SampleSchema,
}

impl SampleCodec {
    /// Create a codec for the given schema.
    pub const fn new(schema: SampleSchema) -> Self {
        Self { schema }
    }

    /// The schema this codec reads and writes.
    pub fn schema(&self) -> SampleSchema {
        self.schema
    }

    /// Width in bytes of one record.
    pub fn record_size(&self) -> usize {
        self.schema.record_size()
    }

    /// Encode one sample into a fixed-width record.
    ///
    /// Under [`SampleSchema::Basic`] any heart rate on the sample is
    /// dropped. Under [`SampleSchema::WithHeartRate`] a missing heart rate
    /// is written as [`HEART_RATE_ABSENT_BITS`].
    pub fn encode(&self, sample: &Sample) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.record_size());
        self.encode_into(sample, &mut buf);
        buf.freeze()
    }

    fn encode_into(&self, sample: &Sample, buf: &mut BytesMut) {
        buf.put_i64(sample.timestamp_ms());
        buf.put_f64(sample.eda());
        buf.put_f64(sample.skin_temperature());
        if self.schema.has_heart_rate() {
            match sample.heart_rate() {
                Some(hr) => buf.put_f64(hr),
                None => buf.put_u64(HEART_RATE_ABSENT_BITS),
            }
        }
    }

    /// Decode one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRecord`] if `record` is not exactly one
    /// record wide.
    pub fn decode(&self, record: &[u8]) -> Result<Sample> {
        if record.len() != self.record_size() {
            return Err(Error::MalformedRecord {
                expected: self.record_size(),
                actual: record.len(),
            });
        }

        let mut buf = record;
        let timestamp_ms = buf.get_i64();
        let eda = buf.get_f64();
        let skin_temperature = buf.get_f64();
        let sample = Sample::with_timestamp(timestamp_ms, eda, skin_temperature);

        if self.schema.has_heart_rate() {
            let bits = buf.get_u64();
            if bits != HEART_RATE_ABSENT_BITS {
                return Ok(sample.with_heart_rate(f64::from_bits(bits)));
            }
        }

        Ok(sample)
    }

    /// Encode an ordered sequence of samples into one bulk payload.
    pub fn encode_bulk(&self, samples: &[Sample]) -> Bytes {
        let mut buf = BytesMut::with_capacity(samples.len() * self.record_size());
        for sample in samples {
            self.encode_into(sample, &mut buf);
        }
        buf.freeze()
    }

    /// Decode a bulk payload, preserving record order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedBulkPayload`] if the payload length is not
    /// a multiple of the record width.
    pub fn decode_bulk(&self, payload: &[u8]) -> Result<Vec<Sample>> {
        let record_size = self.record_size();
        if payload.len() % record_size != 0 {
            return Err(Error::TruncatedBulkPayload {
                length: payload.len(),
                record_size,
            });
        }

        payload
            .chunks_exact(record_size)
            .map(|record| self.decode(record))
            .collect()
    }

    /// Number of whole records in a payload of `len` bytes.
    pub fn record_count(&self, len: usize) -> usize {
        len / self.record_size()
    }
}
