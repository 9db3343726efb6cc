//! Data structures for telemetry samples.
//!
//! This module contains the sample type, the bounded batch buffer that
//! accumulates encoded samples, and the sample source seam.

pub mod bulk_buffer;
pub mod sample;
pub mod source;

pub use bulk_buffer::{BulkSampleBuffer, DEFAULT_CAPACITY_SAMPLES};
pub use sample::Sample;
pub use source::{LatestReadings, SampleSource, SensorKind};
