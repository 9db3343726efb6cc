//! Notification dispatch to subscribed peers.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ble::gatt_server::BackendSlot;
use crate::ble::subscriptions::SubscriptionRegistry;
use crate::ble::uuids::SENSOR_DATA_UUID;
use crate::data::SampleSource;
use crate::error::{Error, Result};
use crate::protocol::SampleCodec;

/// Result of one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nobody is subscribed; nothing was sent.
    NoSubscribers,
    /// Notifications were pushed to the subscriber snapshot.
    Delivered {
        /// Peers notified successfully.
        delivered: usize,
        /// Peers whose notification failed.
        failed: usize,
    },
}

/// Pushes fresh samples to every subscribed peer.
///
/// Obtained from [`TelemetryGattServer::dispatcher`](crate::ble::TelemetryGattServer::dispatcher).
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<SubscriptionRegistry>,
    source: Arc<dyn SampleSource>,
    codec: SampleCodec,
    backend: BackendSlot,
}

impl NotificationDispatcher {
    pub(crate) fn new(
        registry: Arc<SubscriptionRegistry>,
        source: Arc<dyn SampleSource>,
        codec: SampleCodec,
        backend: BackendSlot,
    ) -> Self {
        Self {
            registry,
            source,
            codec,
            backend,
        }
    }

    /// Notify each current subscriber with one freshly encoded sample.
    ///
    /// Peers are notified one at a time from a snapshot of the registry.
    /// A failure for one peer is logged and does not stop the pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerNotReady`] if subscribers exist but no
    /// backend is attached.
    pub fn dispatch(&self) -> Result<DispatchOutcome> {
        let subscribers = self.registry.subscribers();
        if subscribers.is_empty() {
            info!("No subscribers registered");
            return Ok(DispatchOutcome::NoSubscribers);
        }

        let backend = self.backend.read().clone().ok_or(Error::ServerNotReady)?;

        let record = self.codec.encode(&self.source.current_sample());
        info!("Sending notification to {} subscribers", subscribers.len());

        let mut delivered = 0;
        let mut failed = 0;
        for peer in &subscribers {
            match backend.notify(peer, SENSOR_DATA_UUID, &record) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Failed to notify {}: {}", peer, e);
                    failed += 1;
                }
            }
        }

        Ok(DispatchOutcome::Delivered { delivered, failed })
    }

    /// Run a dispatch pass every `interval` until the task is aborted.
    pub fn spawn_periodic(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Periodic notifications every {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.dispatch() {
                    warn!("Notification pass skipped: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::gatt_server::{MockGattServerHandle, TelemetryGattServer};
    use crate::data::Sample;
    use crate::peer::PeerId;

    fn fixed_sample() -> Sample {
        Sample::with_timestamp(42, 1.25, 34.5)
    }

    fn server() -> TelemetryGattServer {
        TelemetryGattServer::new(
            Arc::new(SubscriptionRegistry::new()),
            Arc::new(fixed_sample),
            SampleCodec::default(),
        )
    }

    #[test]
    fn test_no_subscribers_is_noop() {
        let server = server();
        let mut backend = MockGattServerHandle::new();
        backend.expect_notify().never();
        server.attach(Arc::new(backend));

        assert_eq!(
            server.dispatcher().dispatch().unwrap(),
            DispatchOutcome::NoSubscribers
        );
    }

    #[test]
    fn test_not_ready_without_backend() {
        let server = server();
        server
            .registry()
            .write_subscription_state(&PeerId::from("phone"), true);

        let err = server.dispatcher().dispatch().unwrap_err();
        assert!(matches!(err, Error::ServerNotReady));
    }

    #[test]
    fn test_notifies_each_subscriber_once() {
        let server = server();
        for name in ["a", "b", "c"] {
            server
                .registry()
                .write_subscription_state(&PeerId::from(name), true);
        }

        let expected = SampleCodec::default().encode(&fixed_sample());
        let mut backend = MockGattServerHandle::new();
        backend
            .expect_notify()
            .withf(move |_, characteristic, value| {
                *characteristic == SENSOR_DATA_UUID && value == expected.as_ref()
            })
            .times(3)
            .returning(|_, _, _| Ok(()));
        server.attach(Arc::new(backend));

        assert_eq!(
            server.dispatcher().dispatch().unwrap(),
            DispatchOutcome::Delivered {
                delivered: 3,
                failed: 0
            }
        );
    }

    #[test]
    fn test_one_failure_does_not_stop_pass() {
        let server = server();
        server
            .registry()
            .write_subscription_state(&PeerId::from("good"), true);
        server
            .registry()
            .write_subscription_state(&PeerId::from("bad"), true);

        let mut backend = MockGattServerHandle::new();
        backend.expect_notify().times(2).returning(|peer, _, _| {
            if peer.as_str() == "bad" {
                Err(Error::NotConnected)
            } else {
                Ok(())
            }
        });
        server.attach(Arc::new(backend));

        assert_eq!(
            server.dispatcher().dispatch().unwrap(),
            DispatchOutcome::Delivered {
                delivered: 1,
                failed: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_dispatch() {
        let server = server();
        server
            .registry()
            .write_subscription_state(&PeerId::from("phone"), true);

        let mut backend = MockGattServerHandle::new();
        backend
            .expect_notify()
            .times(3)
            .returning(|_, _, _| Ok(()));
        server.attach(Arc::new(backend));

        let handle = server.dispatcher().spawn_periodic(Duration::from_secs(1));
        // First tick fires immediately, then one per second
        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.abort();
        let _ = handle.await;
    }
}
