//! Client configuration descriptor values.
//!
//! The telemetry characteristic's configuration descriptor carries a
//! 2-byte little-endian bitfield, the same encoding as the standard
//! Client Characteristic Configuration Descriptor.

/// Descriptor value that enables notifications.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Descriptor value that disables notifications.
pub const DISABLE_NOTIFICATION_VALUE: [u8; 2] = [0x00, 0x00];

/// Notification state of one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NotificationState {
    /// The peer does not receive notifications.
    #[default]
    Disabled,
    /// The peer receives notifications.
    Enabled,
}

impl NotificationState {
    /// Parse a descriptor write value.
    ///
    /// Returns `None` for anything other than the two sentinels.
    pub fn from_descriptor_value(value: &[u8]) -> Option<Self> {
        if value == ENABLE_NOTIFICATION_VALUE {
            Some(Self::Enabled)
        } else if value == DISABLE_NOTIFICATION_VALUE {
            Some(Self::Disabled)
        } else {
            None
        }
    }

    /// Encode as a descriptor value.
    pub fn to_descriptor_value(self) -> [u8; 2] {
        match self {
            Self::Enabled => ENABLE_NOTIFICATION_VALUE,
            Self::Disabled => DISABLE_NOTIFICATION_VALUE,
        }
    }

    /// Check if notifications are enabled.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl From<bool> for NotificationState {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sentinels() {
        assert_eq!(
            NotificationState::from_descriptor_value(&[0x01, 0x00]),
            Some(NotificationState::Enabled)
        );
        assert_eq!(
            NotificationState::from_descriptor_value(&[0x00, 0x00]),
            Some(NotificationState::Disabled)
        );
        // Indication value is not a notification sentinel
        assert_eq!(NotificationState::from_descriptor_value(&[0x02, 0x00]), None);
        assert_eq!(NotificationState::from_descriptor_value(&[0x01]), None);
    }

    #[test]
    fn test_encode() {
        assert_eq!(
            NotificationState::Enabled.to_descriptor_value(),
            ENABLE_NOTIFICATION_VALUE
        );
        assert_eq!(NotificationState::from(false), NotificationState::Disabled);
        assert!(NotificationState::from(true).is_enabled());
    }
}
