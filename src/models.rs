//! Data models for the weather station pipeline.

use chrono::{DateTime, Utc};

// ---

/// Default conversion factor from hectopascal (millibar) to inches of mercury.
pub const DEFAULT_PRESSURE_INHG_FACTOR: f64 = 0.0295300;

/// Unit system used for the display, the trend comparison and console output.
///
/// Both unit systems are always computed for upload; this only selects which
/// one the station "speaks" locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    Metric,
    Imperial,
}

/// One capture of every sensor channel, taken on a fast tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    // ---
    pub humidity_temp_c: f64,
    pub pressure_temp_c: f64,
    pub heat_source_temp_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
}

/// Snapshot handed to the sinks on an upload tick.
///
/// All values are already rounded to display precision.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    // ---
    pub temp_c: f64,
    pub temp_f: f64,
    pub humidity_pct: f64,
    pub pressure_inhg: f64,
    pub pressure_hpa: f64,
    pub timestamp: DateTime<Utc>,
}

/// Fields of a [`Reading`] a sink can declare it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingField {
    TempC,
    TempF,
    HumidityPct,
    PressureInHg,
    PressureHpa,
    Timestamp,
}

pub fn c_to_f(celsius: f64) -> f64 {
    (celsius * 1.8) + 32.0
}

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

impl Reading {
    // ---
    /// Build the upload snapshot from the smoothed temperature and the most
    /// recent humidity/pressure sample.
    pub fn new(
        smoothed_temp_c: f64,
        humidity_pct: f64,
        pressure_hpa: f64,
        pressure_factor: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        // ---
        Reading {
            temp_c: round_to(smoothed_temp_c, 1),
            temp_f: round_to(c_to_f(smoothed_temp_c), 1),
            humidity_pct: round_to(humidity_pct, 0),
            pressure_inhg: round_to(pressure_hpa * pressure_factor, 1),
            pressure_hpa: round_to(pressure_hpa, 1),
            timestamp,
        }
    }

    /// Temperature in the station's local unit system.
    pub fn temp_in(&self, units: UnitSystem) -> f64 {
        match units {
            UnitSystem::Metric => self.temp_c,
            UnitSystem::Imperial => self.temp_f,
        }
    }
}

/// Rounded temperature in `units`, as the display and the trend see it.
pub fn display_temp(temp_c: f64, units: UnitSystem) -> f64 {
    match units {
        UnitSystem::Metric => round_to(temp_c, 1),
        UnitSystem::Imperial => round_to(c_to_f(temp_c), 1),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn create_test_reading(temp_c: f64, humidity: f64, pressure_hpa: f64) -> Reading {
        // ---
        Reading::new(
            temp_c,
            humidity,
            pressure_hpa,
            DEFAULT_PRESSURE_INHG_FACTOR,
            Utc.with_ymd_and_hms(2025, 3, 26, 18, 40, 0).unwrap(),
        )
    }

    #[test]
    fn test_temperature_conversion() {
        // ---
        let reading = create_test_reading(22.4, 50.0, 1000.0);

        // 22.4°C is 72.32°F, rounded to one decimal
        assert_eq!(reading.temp_f, 72.3);
        assert_eq!(reading.temp_c, 22.4);
    }

    #[test]
    fn test_pressure_conversion() {
        // ---
        let reading = create_test_reading(20.0, 50.0, 1013.25);

        assert_eq!(reading.pressure_inhg, 29.9);
        assert_eq!(reading.pressure_hpa, 1013.3);
    }

    #[test]
    fn test_display_precision() {
        // ---
        let reading = create_test_reading(21.0468, 47.6, 998.04);

        assert_eq!(reading.temp_c, 21.0);
        assert_eq!(reading.humidity_pct, 48.0);
        assert_eq!(reading.pressure_hpa, 998.0);
    }

    #[test]
    fn test_temp_in_unit_system() {
        // ---
        let reading = create_test_reading(0.0, 50.0, 1000.0);

        assert_eq!(reading.temp_in(UnitSystem::Metric), 0.0);
        assert_eq!(reading.temp_in(UnitSystem::Imperial), 32.0);
        assert_eq!(display_temp(100.0, UnitSystem::Imperial), 212.0);
        assert_eq!(display_temp(19.96, UnitSystem::Metric), 20.0);
    }
}
