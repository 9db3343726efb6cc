//! Error types for the wearable-telemetry-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// A single record did not have the schema's fixed width.
    #[error("Malformed record: expected {expected} bytes, got {actual}")]
    MalformedRecord {
        /// The record width required by the schema.
        expected: usize,
        /// The length that was supplied.
        actual: usize,
    },

    /// A bulk payload was not a whole number of records.
    #[error("Truncated bulk payload: {length} bytes is not a multiple of {record_size}")]
    TruncatedBulkPayload {
        /// Total payload length in bytes.
        length: usize,
        /// The record width required by the schema.
        record_size: usize,
    },

    /// Transfers require exactly one reachable peer.
    #[error("Expected exactly one reachable peer, found {found}")]
    AmbiguousPeer {
        /// How many peers were reachable.
        found: usize,
    },

    /// A channel transfer failed part-way.
    #[error("Transfer failed: {reason}")]
    TransferFailed {
        /// Description of the I/O failure.
        reason: String,
    },

    /// A remote peer addressed an attribute this server does not expose.
    #[error("Unknown attribute: {uuid}")]
    UnknownAttribute {
        /// The UUID that was requested.
        uuid: String,
    },

    /// The GATT server backend has not been attached yet.
    #[error("GATT server not ready")]
    ServerNotReady,

    /// Operation requires a connection but the peripheral is not connected.
    #[error("Peripheral not connected")]
    NotConnected,

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// The expected descriptor was not found on the characteristic.
    #[error("Descriptor not found: {uuid}")]
    DescriptorNotFound {
        /// UUID of the missing descriptor.
        uuid: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an I/O error raised on a channel stream.
    pub(crate) fn transfer(context: &str, err: std::io::Error) -> Self {
        Self::TransferFailed {
            reason: format!("{}: {}", context, err),
        }
    }

    /// Check whether this error came from codec framing.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::TruncatedBulkPayload { .. }
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AmbiguousPeer { found: 0 };
        assert_eq!(
            err.to_string(),
            "Expected exactly one reachable peer, found 0"
        );

        let err = Error::TruncatedBulkPayload {
            length: 25,
            record_size: 24,
        };
        assert!(err.to_string().contains("25"));
    }

    #[test]
    fn test_transfer_wraps_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        match Error::transfer("write", io) {
            Error::TransferFailed { reason } => {
                assert!(reason.starts_with("write:"));
                assert!(reason.contains("pipe closed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_framing() {
        assert!(Error::MalformedRecord {
            expected: 24,
            actual: 3
        }
        .is_framing());
        assert!(!Error::ServerNotReady.is_framing());
    }
}
