//! Telemetry GATT server.
//!
//! Serves the telemetry attribute surface:
//!
//! | Attribute     | UUID                                   | Ops          |
//! |---------------|----------------------------------------|--------------|
//! | Sensor Data   | `25a590ef-074b-4408-9489-09186c01b7b6` | Read, Notify |
//! | Client Config | `4dde5b89-d2e7-4a19-8d9e-ecf221ed4802` | Read, Write  |
//!
//! The radio stack reports requests as [`GattEvent`]s. The server answers
//! each through the attached [`GattServerHandle`]; requests for any other
//! attribute are answered with an explicit failure.

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::connection::{ConnectionEvent, ConnectionState};
use crate::ble::notifier::NotificationDispatcher;
use crate::ble::subscriptions::SubscriptionRegistry;
use crate::ble::uuids::is_telemetry_characteristic;
use crate::data::SampleSource;
use crate::error::{Error, Result};
use crate::peer::PeerId;
use crate::protocol::SampleCodec;

/// Shared slot holding the backend once the server is up.
pub(crate) type BackendSlot = Arc<RwLock<Option<Arc<dyn GattServerHandle>>>>;

/// ATT status code sent back with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GattStatus {
    /// Request handled.
    Success,
    /// Read offset past the end of the value.
    InvalidOffset,
    /// Request rejected.
    Failure,
}

impl GattStatus {
    /// Numeric status code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Success => 0x0000,
            Self::InvalidOffset => 0x0007,
            Self::Failure => 0x0101,
        }
    }

    /// Check if this is a success status.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Response to one read or write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattResponse {
    /// Status of the request.
    pub status: GattStatus,
    /// Offset echoed back to the requester.
    pub offset: usize,
    /// Value returned, if any.
    pub value: Option<Bytes>,
}

impl GattResponse {
    /// Successful response carrying a value.
    pub fn success(offset: usize, value: Bytes) -> Self {
        Self {
            status: GattStatus::Success,
            offset,
            value: Some(value),
        }
    }

    /// Successful response with no value.
    pub fn ack() -> Self {
        Self {
            status: GattStatus::Success,
            offset: 0,
            value: None,
        }
    }

    /// Failure response with no value.
    pub fn failure(status: GattStatus) -> Self {
        Self {
            status,
            offset: 0,
            value: None,
        }
    }
}

/// A request or state change reported by the radio stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    /// A peer connected or disconnected.
    ConnectionStateChanged {
        /// The peer.
        peer: PeerId,
        /// Its new state.
        state: ConnectionState,
    },
    /// A peer reads a characteristic.
    CharacteristicRead {
        /// The requesting peer.
        peer: PeerId,
        /// Request ID to answer.
        request_id: u32,
        /// Offset into the value.
        offset: usize,
        /// The characteristic being read.
        characteristic: Uuid,
    },
    /// A peer reads a descriptor.
    DescriptorRead {
        /// The requesting peer.
        peer: PeerId,
        /// Request ID to answer.
        request_id: u32,
        /// Offset into the value.
        offset: usize,
        /// The descriptor being read.
        descriptor: Uuid,
    },
    /// A peer writes a descriptor.
    DescriptorWrite {
        /// The requesting peer.
        peer: PeerId,
        /// Request ID to answer.
        request_id: u32,
        /// The descriptor being written.
        descriptor: Uuid,
        /// Whether the peer expects a response.
        response_needed: bool,
        /// The written value.
        value: Bytes,
    },
}

/// The radio stack's GATT server primitives.
#[cfg_attr(test, mockall::automock)]
pub trait GattServerHandle: Send + Sync {
    /// Answer a read or write request.
    fn send_response(&self, peer: &PeerId, request_id: u32, response: GattResponse) -> Result<()>;

    /// Push a characteristic value change to one peer.
    fn notify(&self, peer: &PeerId, characteristic: Uuid, value: &[u8]) -> Result<()>;
}

/// Serves the telemetry attributes and tracks notification subscribers.
pub struct TelemetryGattServer {
    registry: Arc<SubscriptionRegistry>,
    source: Arc<dyn SampleSource>,
    codec: SampleCodec,
    backend: BackendSlot,
    connection_tx: broadcast::Sender<ConnectionEvent>,
}

impl TelemetryGattServer {
    /// Create a server with no backend attached.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        source: Arc<dyn SampleSource>,
        codec: SampleCodec,
    ) -> Self {
        let (connection_tx, _) = broadcast::channel(32);

        Self {
            registry,
            source,
            codec,
            backend: Arc::new(RwLock::new(None)),
            connection_tx,
        }
    }

    /// Attach the radio stack's server primitives.
    pub fn attach(&self, handle: Arc<dyn GattServerHandle>) {
        *self.backend.write() = Some(handle);
        info!("Telemetry GATT server attached");
    }

    /// Detach the backend; requests are dropped until the next attach.
    pub fn detach(&self) {
        if self.backend.write().take().is_some() {
            info!("Telemetry GATT server detached");
        }
    }

    /// Check if a backend is attached.
    pub fn is_ready(&self) -> bool {
        self.backend.read().is_some()
    }

    /// The subscription registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Subscribe to peer connection changes.
    pub fn subscribe_connections(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection_tx.subscribe()
    }

    /// A dispatcher sharing this server's registry, source and backend.
    pub fn dispatcher(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(
            self.registry.clone(),
            self.source.clone(),
            self.codec,
            self.backend.clone(),
        )
    }

    /// Current value of a characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] for anything but the sensor data
    /// characteristic.
    pub fn read_characteristic(&self, characteristic: &Uuid) -> Result<Bytes> {
        if !is_telemetry_characteristic(characteristic) {
            warn!("Invalid characteristic read: {}", characteristic);
            return Err(Error::UnknownAttribute {
                uuid: characteristic.to_string(),
            });
        }

        Ok(self.codec.encode(&self.source.current_sample()))
    }

    /// Work out the response to an event, applying any state change.
    ///
    /// Returns `None` when no response is due.
    pub fn respond(&self, event: &GattEvent) -> Option<GattResponse> {
        match event {
            GattEvent::ConnectionStateChanged { peer, state } => {
                match state {
                    ConnectionState::Connected => info!("Peer connected: {}", peer),
                    ConnectionState::Disconnected => {
                        info!("Peer disconnected: {}", peer);
                        self.registry.on_peer_disconnected(peer);
                    }
                    _ => debug!("Peer {} is {}", peer, state),
                }
                let _ = self.connection_tx.send(ConnectionEvent {
                    peer: peer.clone(),
                    state: *state,
                });
                None
            }
            GattEvent::CharacteristicRead {
                offset,
                characteristic,
                ..
            } => Some(match self.read_characteristic(characteristic) {
                Ok(value) => Self::slice_response(value, *offset),
                Err(_) => GattResponse::failure(GattStatus::Failure),
            }),
            GattEvent::DescriptorRead {
                peer,
                offset,
                descriptor,
                ..
            } => Some(match self.registry.read_descriptor(peer, descriptor) {
                Ok(value) => Self::slice_response(Bytes::copy_from_slice(&value), *offset),
                Err(_) => GattResponse::failure(GattStatus::Failure),
            }),
            GattEvent::DescriptorWrite {
                peer,
                descriptor,
                response_needed,
                value,
                ..
            } => {
                let response = match self.registry.write_descriptor(peer, descriptor, value) {
                    Ok(()) => GattResponse::ack(),
                    Err(_) => GattResponse::failure(GattStatus::Failure),
                };
                response_needed.then_some(response)
            }
        }
    }

    /// Handle one event and send the response through the backend.
    ///
    /// State changes are applied even when no backend is attached; the
    /// response is then dropped with a warning.
    pub fn handle_event(&self, event: GattEvent) -> Option<GattResponse> {
        let response = self.respond(&event)?;
        let (peer, request_id) = match &event {
            GattEvent::CharacteristicRead {
                peer, request_id, ..
            }
            | GattEvent::DescriptorRead {
                peer, request_id, ..
            }
            | GattEvent::DescriptorWrite {
                peer, request_id, ..
            } => (peer, *request_id),
            GattEvent::ConnectionStateChanged { .. } => return None,
        };

        let backend = self.backend.read().clone();
        match backend {
            Some(backend) => {
                if let Err(e) = backend.send_response(peer, request_id, response.clone()) {
                    warn!("Failed to answer request {} from {}: {}", request_id, peer, e);
                }
            }
            None => warn!(
                "Dropping response to request {} from {}: {}",
                request_id,
                peer,
                Error::ServerNotReady
            ),
        }

        Some(response)
    }

    /// Process events from the radio stack until the sender closes.
    pub fn spawn(self: Arc<Self>, mut events: mpsc::Receiver<GattEvent>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            debug!("GATT event loop started");
            while let Some(event) = events.recv().await {
                self.handle_event(event);
            }
            debug!("GATT event loop ended");
        })
    }

    fn slice_response(value: Bytes, offset: usize) -> GattResponse {
        if offset > value.len() {
            return GattResponse {
                status: GattStatus::InvalidOffset,
                offset,
                value: None,
            };
        }
        GattResponse::success(offset, value.slice(offset..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{CLIENT_CONFIG_UUID, SENSOR_DATA_UUID, TELEMETRY_SERVICE_UUID};
    use crate::data::Sample;
    use crate::protocol::{NotificationState, DISABLE_NOTIFICATION_VALUE, ENABLE_NOTIFICATION_VALUE};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn fixed_sample() -> Sample {
        Sample::with_timestamp(1_700_000_000_000, 5.12131, 36.321)
    }

    fn server() -> TelemetryGattServer {
        TelemetryGattServer::new(
            Arc::new(SubscriptionRegistry::new()),
            Arc::new(fixed_sample),
            SampleCodec::default(),
        )
    }

    fn phone() -> PeerId {
        PeerId::from("phone")
    }

    fn write_config(value: &[u8], response_needed: bool) -> GattEvent {
        GattEvent::DescriptorWrite {
            peer: phone(),
            request_id: 7,
            descriptor: CLIENT_CONFIG_UUID,
            response_needed,
            value: Bytes::copy_from_slice(value),
        }
    }

    #[test]
    fn test_read_sensor_data() {
        let server = server();
        let response = server
            .respond(&GattEvent::CharacteristicRead {
                peer: phone(),
                request_id: 1,
                offset: 0,
                characteristic: SENSOR_DATA_UUID,
            })
            .unwrap();

        assert!(response.status.is_success());
        let value = response.value.unwrap();
        assert_eq!(value.len(), 24);
        assert_eq!(SampleCodec::default().decode(&value).unwrap(), fixed_sample());
    }

    #[test]
    fn test_read_with_offset() {
        let server = server();
        let read = |offset| {
            server
                .respond(&GattEvent::CharacteristicRead {
                    peer: phone(),
                    request_id: 1,
                    offset,
                    characteristic: SENSOR_DATA_UUID,
                })
                .unwrap()
        };

        assert_eq!(read(20).value.unwrap().len(), 4);
        assert_eq!(read(24).value.unwrap().len(), 0);
        assert_eq!(read(25).status, GattStatus::InvalidOffset);
    }

    #[test]
    fn test_read_unknown_characteristic_fails() {
        let server = server();
        let response = server
            .respond(&GattEvent::CharacteristicRead {
                peer: phone(),
                request_id: 1,
                offset: 0,
                characteristic: TELEMETRY_SERVICE_UUID,
            })
            .unwrap();
        assert_eq!(response, GattResponse::failure(GattStatus::Failure));
    }

    #[test]
    fn test_descriptor_read_reports_state_with_success() {
        let server = server();
        let read = || {
            server
                .respond(&GattEvent::DescriptorRead {
                    peer: phone(),
                    request_id: 2,
                    offset: 0,
                    descriptor: CLIENT_CONFIG_UUID,
                })
                .unwrap()
        };

        let response = read();
        assert!(response.status.is_success());
        assert_eq!(response.value.unwrap().as_ref(), &DISABLE_NOTIFICATION_VALUE);

        server.respond(&write_config(&ENABLE_NOTIFICATION_VALUE, false));
        assert_eq!(read().value.unwrap().as_ref(), &ENABLE_NOTIFICATION_VALUE);
    }

    #[test]
    fn test_descriptor_write_response_only_when_needed() {
        let server = server();
        assert_eq!(
            server.respond(&write_config(&ENABLE_NOTIFICATION_VALUE, true)),
            Some(GattResponse::ack())
        );
        assert_eq!(
            server.respond(&write_config(&DISABLE_NOTIFICATION_VALUE, false)),
            None
        );
        assert!(server.registry().is_empty());
    }

    #[test]
    fn test_unknown_descriptor_write_fails() {
        let server = server();
        let response = server.respond(&GattEvent::DescriptorWrite {
            peer: phone(),
            request_id: 3,
            descriptor: SENSOR_DATA_UUID,
            response_needed: true,
            value: Bytes::from_static(&ENABLE_NOTIFICATION_VALUE),
        });
        assert_eq!(response, Some(GattResponse::failure(GattStatus::Failure)));
        assert!(server.registry().is_empty());
    }

    #[test]
    fn test_disconnect_unsubscribes() {
        let server = server();
        server.respond(&write_config(&ENABLE_NOTIFICATION_VALUE, false));
        assert_eq!(server.registry().len(), 1);

        server.respond(&GattEvent::ConnectionStateChanged {
            peer: phone(),
            state: ConnectionState::Disconnected,
        });
        assert_eq!(
            server.registry().read_subscription_state(&phone()),
            NotificationState::Disabled
        );
    }

    #[test]
    fn test_connection_changes_are_published() {
        let server = server();
        let mut connections = server.subscribe_connections();

        server.respond(&GattEvent::ConnectionStateChanged {
            peer: phone(),
            state: ConnectionState::Connected,
        });

        assert_eq!(
            connections.try_recv().unwrap(),
            ConnectionEvent {
                peer: phone(),
                state: ConnectionState::Connected,
            }
        );
    }

    #[test]
    fn test_handle_event_sends_through_backend() {
        let server = server();
        let mut backend = MockGattServerHandle::new();
        backend
            .expect_send_response()
            .with(eq(phone()), eq(7), eq(GattResponse::ack()))
            .times(1)
            .returning(|_, _, _| Ok(()));
        server.attach(Arc::new(backend));

        server.handle_event(write_config(&ENABLE_NOTIFICATION_VALUE, true));
        assert!(server.registry().read_subscription_state(&phone()).is_enabled());
    }

    #[test]
    fn test_handle_event_without_backend_still_applies_state() {
        let server = server();
        assert!(!server.is_ready());

        let response = server.handle_event(write_config(&ENABLE_NOTIFICATION_VALUE, true));
        assert_eq!(response, Some(GattResponse::ack()));
        assert_eq!(server.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_event_loop_processes_until_closed() {
        let server = Arc::new(server());
        let (tx, rx) = mpsc::channel(8);
        let handle = server.clone().spawn(rx);

        tx.send(write_config(&ENABLE_NOTIFICATION_VALUE, false))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(server.registry().len(), 1);
    }
}
