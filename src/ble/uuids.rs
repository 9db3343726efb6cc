//! BLE Service, Characteristic and Descriptor UUIDs.
//!
//! Contains all UUID constants of the telemetry attribute surface.

use uuid::Uuid;

// Telemetry Service
/// Telemetry primary service UUID (advertised by the wearable).
pub const TELEMETRY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1809_0000_1000_8000_00805f9b34fb);
/// Sensor data characteristic UUID (Read, Notify).
pub const SENSOR_DATA_UUID: Uuid = Uuid::from_u128(0x25a5_90ef_074b_4408_9489_09186c01b7b6);
/// Client configuration descriptor UUID of the sensor data characteristic (Read, Write).
pub const CLIENT_CONFIG_UUID: Uuid = Uuid::from_u128(0x4dde_5b89_d2e7_4a19_8d9e_ecf221ed4802);

/// Default path label for bulk transfer channels.
///
/// Both ends must use the same label. Peers that expect a bare app label
/// such as `"chillinapp"` need
/// [`SyncConfig::with_channel_path`](crate::SyncConfig::with_channel_path).
pub const DEFAULT_CHANNEL_PATH: &str = "/telemetry";

/// Check if a characteristic UUID belongs to the telemetry service.
pub fn is_telemetry_characteristic(uuid: &Uuid) -> bool {
    *uuid == SENSOR_DATA_UUID
}

/// Check if a descriptor UUID belongs to the telemetry service.
pub fn is_telemetry_descriptor(uuid: &Uuid) -> bool {
    *uuid == CLIENT_CONFIG_UUID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        let service = TELEMETRY_SERVICE_UUID.to_string();
        assert!(service.contains("1809"));

        assert_eq!(
            SENSOR_DATA_UUID.to_string(),
            "25a590ef-074b-4408-9489-09186c01b7b6"
        );
        assert_eq!(
            CLIENT_CONFIG_UUID.to_string(),
            "4dde5b89-d2e7-4a19-8d9e-ecf221ed4802"
        );
    }

    #[test]
    fn test_attribute_checks() {
        assert!(is_telemetry_characteristic(&SENSOR_DATA_UUID));
        assert!(!is_telemetry_characteristic(&CLIENT_CONFIG_UUID));
        assert!(is_telemetry_descriptor(&CLIENT_CONFIG_UUID));
        assert!(!is_telemetry_descriptor(&TELEMETRY_SERVICE_UUID));
    }
}
