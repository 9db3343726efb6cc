//! Notification subscription bookkeeping.
//!
//! Tracks which peers enabled notifications on the sensor data
//! characteristic. Readers always work on a snapshot, so an enable or
//! disable that lands during a dispatch pass never disturbs it; the pass
//! may at worst include one peer that just left or miss one that just
//! joined.

use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ble::uuids::is_telemetry_descriptor;
use crate::error::{Error, Result};
use crate::peer::PeerId;
use crate::protocol::NotificationState;

/// Set of peers subscribed to telemetry notifications.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscribers: RwLock<HashSet<PeerId>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a peer whose connection was torn down. Idempotent.
    pub fn on_peer_disconnected(&self, peer: &PeerId) {
        if self.subscribers.write().remove(peer) {
            debug!("Removed disconnected subscriber {}", peer);
        }
    }

    /// Current notification state of a peer.
    pub fn read_subscription_state(&self, peer: &PeerId) -> NotificationState {
        self.subscribers.read().contains(peer).into()
    }

    /// Enable or disable notifications for a peer. Idempotent both ways.
    pub fn write_subscription_state(&self, peer: &PeerId, enabled: bool) {
        let mut subscribers = self.subscribers.write();
        if enabled {
            if subscribers.insert(peer.clone()) {
                debug!("Subscribed {} to notifications", peer);
            }
        } else if subscribers.remove(peer) {
            debug!("Unsubscribed {} from notifications", peer);
        }
    }

    /// Copy of the current subscriber set.
    pub fn subscribers(&self) -> HashSet<PeerId> {
        self.subscribers.read().clone()
    }

    /// Number of subscribed peers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Check if no peer is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Answer a descriptor read for `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] for any descriptor other than
    /// the client configuration descriptor.
    pub fn read_descriptor(&self, peer: &PeerId, descriptor: &Uuid) -> Result<[u8; 2]> {
        if !is_telemetry_descriptor(descriptor) {
            warn!("Unknown descriptor read request: {}", descriptor);
            return Err(Error::UnknownAttribute {
                uuid: descriptor.to_string(),
            });
        }

        debug!("Config descriptor read by {}", peer);
        Ok(self.read_subscription_state(peer).to_descriptor_value())
    }

    /// Apply a descriptor write from `peer`.
    ///
    /// A value that is neither the enable nor the disable sentinel leaves
    /// the subscription unchanged but is still acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] for any descriptor other than
    /// the client configuration descriptor.
    pub fn write_descriptor(&self, peer: &PeerId, descriptor: &Uuid, value: &[u8]) -> Result<()> {
        if !is_telemetry_descriptor(descriptor) {
            warn!("Unknown descriptor write request: {}", descriptor);
            return Err(Error::UnknownAttribute {
                uuid: descriptor.to_string(),
            });
        }

        match NotificationState::from_descriptor_value(value) {
            Some(state) => self.write_subscription_state(peer, state.is_enabled()),
            None => warn!(
                "Ignoring config descriptor value {:02X?} from {}",
                value, peer
            ),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{CLIENT_CONFIG_UUID, SENSOR_DATA_UUID};
    use crate::protocol::{DISABLE_NOTIFICATION_VALUE, ENABLE_NOTIFICATION_VALUE};
    use std::sync::Arc;

    fn peer(name: &str) -> PeerId {
        PeerId::from(name)
    }

    #[test]
    fn test_enable_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        registry.write_subscription_state(&peer("a"), true);
        registry.write_subscription_state(&peer("a"), true);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.read_subscription_state(&peer("a")),
            NotificationState::Enabled
        );
    }

    #[test]
    fn test_disable_unsubscribed_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.write_subscription_state(&peer("ghost"), false);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_disconnect_removes_subscriber() {
        let registry = SubscriptionRegistry::new();
        registry.write_subscription_state(&peer("a"), true);
        registry.on_peer_disconnected(&peer("a"));
        registry.on_peer_disconnected(&peer("a"));
        assert_eq!(
            registry.read_subscription_state(&peer("a")),
            NotificationState::Disabled
        );
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let registry = SubscriptionRegistry::new();
        let p = peer("phone");

        assert_eq!(
            registry.read_descriptor(&p, &CLIENT_CONFIG_UUID).unwrap(),
            DISABLE_NOTIFICATION_VALUE
        );

        registry
            .write_descriptor(&p, &CLIENT_CONFIG_UUID, &ENABLE_NOTIFICATION_VALUE)
            .unwrap();
        assert_eq!(
            registry.read_descriptor(&p, &CLIENT_CONFIG_UUID).unwrap(),
            ENABLE_NOTIFICATION_VALUE
        );

        registry
            .write_descriptor(&p, &CLIENT_CONFIG_UUID, &DISABLE_NOTIFICATION_VALUE)
            .unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_descriptor_rejected() {
        let registry = SubscriptionRegistry::new();
        let p = peer("phone");

        let err = registry
            .write_descriptor(&p, &SENSOR_DATA_UUID, &ENABLE_NOTIFICATION_VALUE)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute { .. }));
        assert!(registry.is_empty());

        assert!(registry.read_descriptor(&p, &SENSOR_DATA_UUID).is_err());
    }

    #[test]
    fn test_unrecognized_value_acknowledged_without_change() {
        let registry = SubscriptionRegistry::new();
        let p = peer("phone");
        registry
            .write_descriptor(&p, &CLIENT_CONFIG_UUID, &[0x02, 0x00])
            .unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let registry = SubscriptionRegistry::new();
        registry.write_subscription_state(&peer("a"), true);
        registry.write_subscription_state(&peer("b"), true);

        let snapshot = registry.subscribers();
        registry.write_subscription_state(&peer("a"), false);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_mutation_during_iteration() {
        let registry = Arc::new(SubscriptionRegistry::new());
        for i in 0..50 {
            registry.write_subscription_state(&peer(&format!("p{i}")), true);
        }

        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    registry.write_subscription_state(&peer(&format!("p{i}")), false);
                }
            })
        };

        let mut seen = 0;
        for _ in 0..10 {
            seen += registry.subscribers().iter().count();
        }
        writer.join().unwrap();

        assert!(seen <= 500);
        assert!(registry.is_empty());
    }
}
