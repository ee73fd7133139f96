//! Temperature compensation for the Sense HAT.
//!
//! Both on-board sensors sit a few millimetres above the Pi's SoC and read
//! several degrees high once the CPU warms up. The corrected estimate pulls
//! the average of the two sensors away from the CPU temperature by a damped
//! fraction of their difference.

use crate::models::RawSample;

// ---

/// Damping divisor for the CPU-to-sensor thermal coupling of a Pi 3 with the
/// HAT mounted directly on the header.
pub const DEFAULT_HEAT_DAMPING: f64 = 1.5;

/// Device-specific calibration values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    // ---
    /// Divisor applied to the heat source / sensor difference. Must be > 0.
    pub heat_damping: f64,

    /// hPa to inHg conversion factor used for upload.
    pub pressure_inhg_factor: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            heat_damping: DEFAULT_HEAT_DAMPING,
            pressure_inhg_factor: crate::models::DEFAULT_PRESSURE_INHG_FACTOR,
        }
    }
}

/// Correct the averaged sensor temperature for heat-source bias.
pub fn compensate(humidity_temp: f64, pressure_temp: f64, heat_source_temp: f64, damping: f64) -> f64 {
    // ---
    let base = (humidity_temp + pressure_temp) / 2.0;
    base - (heat_source_temp - base) / damping
}

impl Calibration {
    /// Corrected temperature for a full sample.
    pub fn corrected_temp(&self, sample: &RawSample) -> f64 {
        compensate(
            sample.humidity_temp_c,
            sample.pressure_temp_c,
            sample.heat_source_temp_c,
            self.heat_damping,
        )
    }
}
