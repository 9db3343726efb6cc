//! Runtime configuration shared by both roles.

use std::time::Duration;

use crate::ble::uuids::DEFAULT_CHANNEL_PATH;
use crate::data::DEFAULT_CAPACITY_SAMPLES;
use crate::error::{Error, Result};
use crate::protocol::{SampleCodec, SampleSchema};
use crate::transfer::DEFAULT_READ_CHUNK_SIZE;

/// Settings for a wearable or companion endpoint.
///
/// Both ends of a pairing must agree on `schema` and `channel_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncConfig {
    /// Samples per bulk batch.
    pub capacity_samples: usize,
    /// Record layout.
    pub schema: SampleSchema,
    /// Topic label for bulk channels.
    pub channel_path: String,
    /// Receiver scratch window in bytes.
    pub read_chunk_size: usize,
    /// Deadline for each stream read or write.
    pub transfer_timeout: Option<Duration>,
    /// Period of automatic notification passes.
    pub notification_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            capacity_samples: DEFAULT_CAPACITY_SAMPLES,
            schema: SampleSchema::Basic,
            channel_path: DEFAULT_CHANNEL_PATH.to_string(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            transfer_timeout: None,
            notification_interval: None,
        }
    }
}

impl SyncConfig {
    /// Set the batch capacity.
    pub fn with_capacity(mut self, capacity_samples: usize) -> Self {
        self.capacity_samples = capacity_samples;
        self
    }

    /// Set the record schema.
    pub fn with_schema(mut self, schema: SampleSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the channel path.
    pub fn with_channel_path(mut self, path: impl Into<String>) -> Self {
        self.channel_path = path.into();
        self
    }

    /// Set the receiver scratch window.
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the per-operation transfer deadline.
    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = Some(timeout);
        self
    }

    /// Enable periodic notifications.
    pub fn with_notification_interval(mut self, interval: Duration) -> Self {
        self.notification_interval = Some(interval);
        self
    }

    /// Codec for the configured schema.
    pub fn codec(&self) -> SampleCodec {
        SampleCodec::new(self.schema)
    }

    /// Check the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.capacity_samples == 0 {
            return Err(invalid("capacity_samples", &self.capacity_samples));
        }
        if self.channel_path.is_empty() {
            return Err(invalid("channel_path", &"\"\""));
        }
        if self.read_chunk_size == 0 {
            return Err(invalid("read_chunk_size", &self.read_chunk_size));
        }
        if self.transfer_timeout == Some(Duration::ZERO) {
            return Err(invalid("transfer_timeout", &"0s"));
        }
        if self.notification_interval == Some(Duration::ZERO) {
            return Err(invalid("notification_interval", &"0s"));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: &dyn std::fmt::Display) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}
