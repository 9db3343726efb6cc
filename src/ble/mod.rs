//! BLE communication module.
//!
//! This module provides the telemetry GATT surface: the served
//! attributes, notification subscriptions and dispatch on the wearable
//! side, and a GATT client for the companion side.

pub mod client;
pub mod connection;
pub mod gatt_server;
pub mod notifier;
pub mod subscriptions;
pub mod uuids;

pub use client::TelemetryClient;
pub use connection::{ConnectionEvent, ConnectionState};
pub use gatt_server::{GattEvent, GattResponse, GattServerHandle, GattStatus, TelemetryGattServer};
pub use notifier::{DispatchOutcome, NotificationDispatcher};
pub use subscriptions::SubscriptionRegistry;
pub use uuids::*;
