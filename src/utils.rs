//! Utility functions for the wearable-telemetry-ble crate.

use chrono::{DateTime, TimeZone, Utc};

/// Current wall-clock time as epoch milliseconds.
///
/// # Example
///
/// ```
/// use wearable_telemetry_ble::now_millis;
///
/// assert!(now_millis() > 1_600_000_000_000);
/// ```
#[inline]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds to a UTC timestamp.
///
/// # Arguments
///
/// * `millis` - Milliseconds since the Unix epoch
///
/// # Returns
///
/// `None` if the value is outside chrono's representable range.
///
/// # Example
///
/// ```
/// use wearable_telemetry_ble::millis_to_datetime;
///
/// let dt = millis_to_datetime(0).unwrap();
/// assert_eq!(dt.timestamp(), 0);
/// ```
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Format the first bytes of a payload for trace logs.
pub(crate) fn hex_preview(data: &[u8]) -> String {
    let shown = &data[..std::cmp::min(data.len(), 24)];
    let mut out = format!("{:02X?}", shown);
    if data.len() > shown.len() {
        out.push_str(&format!(" (+{} bytes)", data.len() - shown.len()));
    }
    out
}
