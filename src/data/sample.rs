//! Physiological sample data structure.
//!
//! A sample is one timestamped reading from the wearable's sensor set.

use chrono::{DateTime, Utc};

use crate::utils::{millis_to_datetime, now_millis};

/// One timestamped reading from the sensor set.
///
/// Samples are immutable once built. Equality is bitwise over every
/// field, so two samples carrying the same NaN payload compare equal and
/// `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    timestamp_ms: i64,
    eda: f64,
    skin_temperature: f64,
    heart_rate: Option<f64>,
}

impl Sample {
    /// Create a sample stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `eda` - Electrodermal activity reading
    /// * `skin_temperature` - Skin temperature in degrees Celsius
    pub fn new(eda: f64, skin_temperature: f64) -> Self {
        Self::with_timestamp(now_millis(), eda, skin_temperature)
    }

    /// Create a sample with an explicit capture time.
    pub fn with_timestamp(timestamp_ms: i64, eda: f64, skin_temperature: f64) -> Self {
        Self {
            timestamp_ms,
            eda,
            skin_temperature,
            heart_rate: None,
        }
    }

    /// Return a copy of this sample carrying a heart rate reading.
    pub fn with_heart_rate(self, heart_rate: f64) -> Self {
        Self {
            heart_rate: Some(heart_rate),
            ..self
        }
    }

    /// Capture time in epoch milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Capture time as a UTC timestamp, if representable.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.timestamp_ms)
    }

    /// Electrodermal activity reading.
    pub fn eda(&self) -> f64 {
        self.eda
    }

    /// Skin temperature reading.
    pub fn skin_temperature(&self) -> f64 {
        self.skin_temperature
    }

    /// Heart rate reading, when the sample carries one.
    pub fn heart_rate(&self) -> Option<f64> {
        self.heart_rate
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp_ms == other.timestamp_ms
            && self.eda.to_bits() == other.eda.to_bits()
            && self.skin_temperature.to_bits() == other.skin_temperature.to_bits()
            && self.heart_rate.map(f64::to_bits) == other.heart_rate.map(f64::to_bits)
    }
}

impl Eq for Sample {}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sample {{ t={} eda={:.4} st={:.2}",
            self.timestamp_ms, self.eda, self.skin_temperature
        )?;
        if let Some(hr) = self.heart_rate {
            write!(f, " hr={:.1}", hr)?;
        }
        write!(f, " }}")
    }
}
