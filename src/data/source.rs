//! Sample sources.
//!
//! Sensor acquisition lives outside this crate. A [`SampleSource`] is the
//! seam through which the producer asks for a fresh sample.

use parking_lot::RwLock;
use tracing::trace;

use super::sample::Sample;
use crate::utils::now_millis;

/// Something that can produce a fresh sample on demand.
pub trait SampleSource: Send + Sync {
    /// Produce a sample reflecting the latest readings.
    fn current_sample(&self) -> Sample;
}

impl<F> SampleSource for F
where
    F: Fn() -> Sample + Send + Sync,
{
    fn current_sample(&self) -> Sample {
        self()
    }
}

/// The physical sensors feeding a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// Electrodermal activity.
    Eda,
    /// Skin temperature.
    SkinTemperature,
    /// Heart rate.
    HeartRate,
}

#[derive(Debug, Default)]
struct Readings {
    eda: f64,
    skin_temperature: f64,
    heart_rate: Option<f64>,
}

/// Keeps the last reading of each sensor and builds samples from them.
///
/// Sensors report independently and at their own rates; each sample
/// combines the most recent value of every sensor. Zero readings are
/// treated as "no reading yet" and ignored.
#[derive(Debug, Default)]
pub struct LatestReadings {
    readings: RwLock<Readings>,
}

impl LatestReadings {
    /// Create with every sensor at zero and no heart rate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new value from one sensor.
    ///
    /// Returns `false` if the value was ignored.
    pub fn update(&self, kind: SensorKind, value: f64) -> bool {
        if value == 0.0 {
            return false;
        }

        let mut readings = self.readings.write();
        match kind {
            SensorKind::Eda => readings.eda = value,
            SensorKind::SkinTemperature => readings.skin_temperature = value,
            SensorKind::HeartRate => readings.heart_rate = Some(value),
        }
        trace!("Sensor {:?} updated to {}", kind, value);
        true
    }

    /// Build a sample with an explicit timestamp.
    pub fn sample_at(&self, timestamp_ms: i64) -> Sample {
        let readings = self.readings.read();
        let sample = Sample::with_timestamp(timestamp_ms, readings.eda, readings.skin_temperature);
        match readings.heart_rate {
            Some(hr) => sample.with_heart_rate(hr),
            None => sample,
        }
    }
}

impl SampleSource for LatestReadings {
    fn current_sample(&self) -> Sample {
        self.sample_at(now_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_readings_combine() {
        let readings = LatestReadings::new();
        assert!(readings.update(SensorKind::Eda, 5.12));
        assert!(readings.update(SensorKind::SkinTemperature, 36.3));

        let sample = readings.sample_at(10);
        assert_eq!(sample, Sample::with_timestamp(10, 5.12, 36.3));

        readings.update(SensorKind::HeartRate, 71.0);
        assert_eq!(readings.sample_at(11).heart_rate(), Some(71.0));
    }

    #[test]
    fn test_zero_reading_ignored() {
        let readings = LatestReadings::new();
        readings.update(SensorKind::Eda, 2.0);
        assert!(!readings.update(SensorKind::Eda, 0.0));
        assert_eq!(readings.sample_at(0).eda(), 2.0);
    }

    #[test]
    fn test_closure_source() {
        let source = || Sample::with_timestamp(1, 2.0, 3.0);
        assert_eq!(source.current_sample().timestamp_ms(), 1);
    }
}
