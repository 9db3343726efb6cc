//! Protocol module for encoding and decoding telemetry on the wire.
//!
//! This module contains the implementations for:
//! - The fixed-width sample record codec
//! - Client configuration descriptor values

pub mod codec;
pub mod descriptor;

pub use codec::{SampleCodec, SampleSchema, HEART_RATE_ABSENT_BITS};
pub use descriptor::{NotificationState, DISABLE_NOTIFICATION_VALUE, ENABLE_NOTIFICATION_VALUE};
