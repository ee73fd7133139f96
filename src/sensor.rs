//! Sense HAT sensor access.
//!
//! The HAT carries an HTS221 (humidity + temperature) and an LPS25H
//! (pressure + temperature). With the `rpisense` overlay loaded both are
//! exposed by the kernel's IIO drivers, so reading a channel is a matter of
//! reading `in_<channel>_{raw,offset,scale}` from sysfs. The heat source is
//! the SoC itself, read from the thermal zone.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::RawSample;

// ---

const HUMIDITY_DEVICE: &str = "hts221";
const PRESSURE_DEVICE: &str = "lps25h";

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unparseable value {value:?} in {}", .path.display())]
    Parse { path: PathBuf, value: String },

    #[error("no IIO device named '{0}' under {}", .1.display())]
    DeviceNotFound(&'static str, PathBuf),
}

/// Source of the five sensor channels the station consumes.
pub trait SensorSource {
    fn read_humidity_temp(&mut self) -> Result<f64, SensorError>;
    fn read_pressure_temp(&mut self) -> Result<f64, SensorError>;
    fn read_heat_source_temp(&mut self) -> Result<f64, SensorError>;
    fn read_humidity(&mut self) -> Result<f64, SensorError>;
    fn read_pressure(&mut self) -> Result<f64, SensorError>;

    /// Capture every channel. Any failing channel fails the whole sample.
    fn sample(&mut self) -> Result<RawSample, SensorError> {
        // ---
        Ok(RawSample {
            humidity_temp_c: self.read_humidity_temp()?,
            pressure_temp_c: self.read_pressure_temp()?,
            heat_source_temp_c: self.read_heat_source_temp()?,
            humidity_pct: self.read_humidity()?,
            pressure_hpa: self.read_pressure()?,
        })
    }
}

fn read_f64(path: &Path) -> Result<f64, SensorError> {
    // ---
    let text = fs::read_to_string(path).map_err(|source| SensorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = text.trim();
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(SensorError::Parse {
            path: path.to_path_buf(),
            value: value.to_string(),
        }),
    }
}

/// `(raw + offset) * scale`, with offset and scale optional as in the IIO ABI.
fn read_channel(device: &Path, channel: &str) -> Result<f64, SensorError> {
    // ---
    let raw = read_f64(&device.join(format!("in_{channel}_raw")))?;

    let optional = |suffix: &str, default: f64| {
        let path = device.join(format!("in_{channel}_{suffix}"));
        if path.exists() {
            read_f64(&path)
        } else {
            Ok(default)
        }
    };
    let offset = optional("offset", 0.0)?;
    let scale = optional("scale", 1.0)?;

    Ok((raw + offset) * scale)
}

fn find_iio_device(root: &Path, name: &'static str) -> Result<PathBuf, SensorError> {
    // ---
    let entries = fs::read_dir(root).map_err(|source| SensorError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let dir = entry.path();
        let Ok(device_name) = fs::read_to_string(dir.join("name")) else {
            continue;
        };
        if device_name.trim() == name {
            debug!("Found {} at {}", name, dir.display());
            return Ok(dir);
        }
    }

    Err(SensorError::DeviceNotFound(name, root.to_path_buf()))
}

/// Sense HAT read through IIO sysfs plus the SoC thermal zone.
#[derive(Debug, Clone)]
pub struct SenseHat {
    humidity_dev: PathBuf,
    pressure_dev: PathBuf,
    cpu_temp: PathBuf,
}

impl SenseHat {
    /// Locate both HAT sensors under `iio_root` and check every channel can
    /// be read once.
    pub fn open(iio_root: &Path, cpu_temp: &Path) -> Result<Self, SensorError> {
        // ---
        let mut hat = SenseHat {
            humidity_dev: find_iio_device(iio_root, HUMIDITY_DEVICE)?,
            pressure_dev: find_iio_device(iio_root, PRESSURE_DEVICE)?,
            cpu_temp: cpu_temp.to_path_buf(),
        };
        hat.sample()?;
        Ok(hat)
    }
}

// IIO reports temperature in milli-°C, relative humidity in milli-percent
// and pressure in kPa. The thermal zone reports milli-°C.
impl SensorSource for SenseHat {
    fn read_humidity_temp(&mut self) -> Result<f64, SensorError> {
        Ok(read_channel(&self.humidity_dev, "temp")? / 1000.0)
    }

    fn read_pressure_temp(&mut self) -> Result<f64, SensorError> {
        Ok(read_channel(&self.pressure_dev, "temp")? / 1000.0)
    }

    fn read_heat_source_temp(&mut self) -> Result<f64, SensorError> {
        Ok(read_f64(&self.cpu_temp)? / 1000.0)
    }

    fn read_humidity(&mut self) -> Result<f64, SensorError> {
        Ok(read_channel(&self.humidity_dev, "humidityrelative")? / 1000.0)
    }

    fn read_pressure(&mut self) -> Result<f64, SensorError> {
        Ok(read_channel(&self.pressure_dev, "pressure")? * 10.0)
    }
}
