//! Configuration loader for the `pistation` weather station.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Every value is validated here, before the scheduler
//! starts, so a bad setting stops the process at startup instead of at the
//! first upload tick.
//!
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::compensation::{Calibration, DEFAULT_HEAT_DAMPING};
use crate::models::{UnitSystem, DEFAULT_PRESSURE_INHG_FACTOR};

/// Weather Underground personal weather station upload endpoint.
pub const DEFAULT_WU_URL: &str =
    "http://weatherstation.wunderground.com/weatherstation/updateweatherstation.php";

/// Initial State event API base.
pub const DEFAULT_IS_API_URL: &str = "https://groker.init.st/api";

/// Parse an optional numeric variable with a default value.
macro_rules! parse_var {
    ($lookup:expr, $ty:ty, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional boolean variable with a default value.
macro_rules! parse_bool {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        match $lookup($var_name).as_deref().map(str::trim) {
            None => $default,
            Some("1") | Some("true") | Some("yes") | Some("True") => true,
            Some("0") | Some("false") | Some("no") | Some("False") => false,
            Some(other) => bail!("Invalid {}: expected true or false, got '{}'", $var_name, other),
        }
    };
}

/// Parse a required string variable.
macro_rules! require_var {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .filter(|v: &String| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Credentials for the Weather Underground PWS upload.
#[derive(Debug, Clone)]
pub struct WeatherUndergroundConfig {
    // ---
    pub station_id: String,
    pub station_key: String,
    pub url: String,
}

/// Credentials for the Initial State event stream.
#[derive(Debug, Clone)]
pub struct InitialStateConfig {
    // ---
    pub bucket_name: String,
    pub bucket_key: String,
    pub access_key: String,
    pub api_url: String,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Minutes between uploads, in (0, 60].
    pub upload_interval_min: u32,

    /// Seconds between sensor samples, in (0, 60].
    pub sample_interval_sec: u32,

    /// Unit system for the display, trend and console output.
    pub units: UnitSystem,

    /// Weather Underground sink, `None` when `WU_UPLOAD` is off.
    pub weather_underground: Option<WeatherUndergroundConfig>,

    /// Initial State sink, `None` when `IS_UPLOAD` is off.
    pub initial_state: Option<InitialStateConfig>,

    /// Optional label prefix for Initial State events.
    pub location_name: Option<String>,

    /// Device calibration constants.
    pub calibration: Calibration,

    /// Per-request timeout for sink HTTP calls.
    pub http_timeout: Duration,

    /// Root of the IIO sysfs device tree.
    pub iio_dir: PathBuf,

    /// Thermal zone file holding the SoC temperature in milli-°C.
    pub cpu_temp_path: PathBuf,

    /// LED matrix framebuffer, logged instead of drawn when unset.
    pub framebuffer: Option<PathBuf>,
}

/// Load configuration from environment variables with defaults.
///
/// Required when the matching sink is enabled:
/// - `WU_STATION_ID`, `WU_STATION_KEY`
/// - `IS_BUCKET_NAME`, `IS_BUCKET_KEY`, `IS_ACCESS_KEY`
///
/// Optional:
/// - `MEASUREMENT_INTERVAL` – upload interval in minutes (default: 10, max 60)
/// - `SAMPLE_INTERVAL_SECS` – sampling interval in seconds (default: 5)
/// - `USE_METRIC` – metric display units (default: true)
/// - `WU_UPLOAD` / `IS_UPLOAD` – enable each sink (default: true)
/// - `WU_URL` / `IS_API_URL` – sink endpoints
/// - `SENSOR_LOCATION_NAME` – label prefix for Initial State events
/// - `HEAT_DAMPING` – CPU heat compensation divisor (default: 1.5)
/// - `PRESSURE_INHG_FACTOR` – hPa to inHg factor (default: 0.0295300)
/// - `HTTP_TIMEOUT_SECS` – sink request timeout (default: 30)
/// - `SENSE_HAT_IIO_DIR`, `CPU_TEMP_PATH`, `SENSE_HAT_FRAMEBUFFER`
///
/// Returns an error if any required variable is missing or any value is invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let upload_interval_min = parse_var!(lookup, u32, "MEASUREMENT_INTERVAL", 10);
    if upload_interval_min == 0 || upload_interval_min > 60 {
        bail!(
            "MEASUREMENT_INTERVAL must be between 1 and 60 minutes, got {}",
            upload_interval_min
        );
    }

    let sample_interval_sec = parse_var!(lookup, u32, "SAMPLE_INTERVAL_SECS", 5);
    if sample_interval_sec == 0 || sample_interval_sec > 60 {
        bail!(
            "SAMPLE_INTERVAL_SECS must be between 1 and 60 seconds, got {}",
            sample_interval_sec
        );
    }

    let units = if parse_bool!(lookup, "USE_METRIC", true) {
        UnitSystem::Metric
    } else {
        UnitSystem::Imperial
    };

    let weather_underground = if parse_bool!(lookup, "WU_UPLOAD", true) {
        Some(WeatherUndergroundConfig {
            station_id: require_var!(lookup, "WU_STATION_ID"),
            station_key: require_var!(lookup, "WU_STATION_KEY"),
            url: lookup("WU_URL").unwrap_or_else(|| DEFAULT_WU_URL.to_string()),
        })
    } else {
        None
    };

    let initial_state = if parse_bool!(lookup, "IS_UPLOAD", true) {
        Some(InitialStateConfig {
            bucket_name: require_var!(lookup, "IS_BUCKET_NAME"),
            bucket_key: require_var!(lookup, "IS_BUCKET_KEY"),
            access_key: require_var!(lookup, "IS_ACCESS_KEY"),
            api_url: lookup("IS_API_URL").unwrap_or_else(|| DEFAULT_IS_API_URL.to_string()),
        })
    } else {
        None
    };

    let heat_damping = parse_var!(lookup, f64, "HEAT_DAMPING", DEFAULT_HEAT_DAMPING);
    if !heat_damping.is_finite() || heat_damping <= 0.0 {
        bail!("HEAT_DAMPING must be a positive number, got {}", heat_damping);
    }

    let pressure_inhg_factor =
        parse_var!(lookup, f64, "PRESSURE_INHG_FACTOR", DEFAULT_PRESSURE_INHG_FACTOR);
    if !pressure_inhg_factor.is_finite() || pressure_inhg_factor <= 0.0 {
        bail!(
            "PRESSURE_INHG_FACTOR must be a positive number, got {}",
            pressure_inhg_factor
        );
    }

    let http_timeout_secs = parse_var!(lookup, u64, "HTTP_TIMEOUT_SECS", 30);
    if http_timeout_secs == 0 {
        bail!("HTTP_TIMEOUT_SECS must be at least 1 second");
    }

    Ok(Config {
        upload_interval_min,
        sample_interval_sec,
        units,
        weather_underground,
        initial_state,
        location_name: lookup("SENSOR_LOCATION_NAME").filter(|name| !name.trim().is_empty()),
        calibration: Calibration {
            heat_damping,
            pressure_inhg_factor,
        },
        http_timeout: Duration::from_secs(http_timeout_secs),
        iio_dir: lookup("SENSE_HAT_IIO_DIR")
            .unwrap_or_else(|| "/sys/bus/iio/devices".to_string())
            .into(),
        cpu_temp_path: lookup("CPU_TEMP_PATH")
            .unwrap_or_else(|| "/sys/class/thermal/thermal_zone0/temp".to_string())
            .into(),
        framebuffer: lookup("SENSE_HAT_FRAMEBUFFER").map(PathBuf::from),
    })
}

/// Mask a secret, keeping at most a quarter of it (and never more than four
/// characters) visible at the end.
fn mask(secret: &str) -> String {
    // ---
    let len = secret.chars().count();
    let visible = (len / 4).min(4);
    let tail: String = secret.chars().skip(len - visible).collect();
    format!("****{}", tail)
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks station keys and access keys while showing all configuration
    /// values that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  MEASUREMENT_INTERVAL : {} min", self.upload_interval_min);
        tracing::info!("  SAMPLE_INTERVAL_SECS : {} s", self.sample_interval_sec);
        tracing::info!("  UNITS                : {:?}", self.units);
        tracing::info!("  HEAT_DAMPING         : {}", self.calibration.heat_damping);
        tracing::info!("  PRESSURE_INHG_FACTOR : {}", self.calibration.pressure_inhg_factor);

        match &self.weather_underground {
            Some(wu) => {
                tracing::info!("  WU_STATION_ID        : {}", wu.station_id);
                tracing::info!("  WU_STATION_KEY       : {}", mask(&wu.station_key));
            }
            None => tracing::info!("  WU_UPLOAD            : disabled"),
        }

        match &self.initial_state {
            Some(is) => {
                tracing::info!("  IS_BUCKET_NAME       : {}", is.bucket_name);
                tracing::info!("  IS_ACCESS_KEY        : {}", mask(&is.access_key));
            }
            None => tracing::info!("  IS_UPLOAD            : disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        // ---
        let mut map: HashMap<String, String> = [
            ("WU_STATION_ID", "KCASANFR123"),
            ("WU_STATION_KEY", "abcdef12"),
            ("IS_BUCKET_NAME", "Backyard"),
            ("IS_BUCKET_KEY", "backyard-pi"),
            ("IS_ACCESS_KEY", "ist_0123456789"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        map
    }

    fn load(map: &HashMap<String, String>) -> Result<Config> {
        load_from(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        // ---
        let cfg = load(&vars(&[])).unwrap();

        assert_eq!(cfg.upload_interval_min, 10);
        assert_eq!(cfg.sample_interval_sec, 5);
        assert_eq!(cfg.units, UnitSystem::Metric);
        assert_eq!(cfg.calibration, Calibration::default());
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
        assert_eq!(cfg.weather_underground.unwrap().url, DEFAULT_WU_URL);
        assert_eq!(cfg.initial_state.unwrap().api_url, DEFAULT_IS_API_URL);
        assert!(cfg.framebuffer.is_none());
    }

    #[test]
    fn test_upload_interval_bounds() {
        // ---
        assert!(load(&vars(&[("MEASUREMENT_INTERVAL", "61")])).is_err());
        assert!(load(&vars(&[("MEASUREMENT_INTERVAL", "0")])).is_err());
        assert!(load(&vars(&[("MEASUREMENT_INTERVAL", "ten")])).is_err());

        let cfg = load(&vars(&[("MEASUREMENT_INTERVAL", "60")])).unwrap();
        assert_eq!(cfg.upload_interval_min, 60);
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        // ---
        let mut map = vars(&[]);
        map.remove("WU_STATION_KEY");
        let err = load(&map).unwrap_err();
        assert!(err.to_string().contains("WU_STATION_KEY"));

        let mut map = vars(&[]);
        map.insert("IS_ACCESS_KEY".to_string(), "   ".to_string());
        let err = load(&map).unwrap_err();
        assert!(err.to_string().contains("IS_ACCESS_KEY"));
    }

    #[test]
    fn test_disabled_sink_needs_no_credentials() {
        // ---
        let mut map = vars(&[("WU_UPLOAD", "false")]);
        map.remove("WU_STATION_ID");
        map.remove("WU_STATION_KEY");

        let cfg = load(&map).unwrap();
        assert!(cfg.weather_underground.is_none());
        assert!(cfg.initial_state.is_some());
    }

    #[test]
    fn test_calibration_and_units() {
        // ---
        let cfg = load(&vars(&[
            ("USE_METRIC", "no"),
            ("HEAT_DAMPING", "2.25"),
            ("PRESSURE_INHG_FACTOR", "0.02953"),
        ]))
        .unwrap();

        assert_eq!(cfg.units, UnitSystem::Imperial);
        assert_eq!(cfg.calibration.heat_damping, 2.25);

        assert!(load(&vars(&[("HEAT_DAMPING", "0")])).is_err());
        assert!(load(&vars(&[("USE_METRIC", "maybe")])).is_err());
    }

    #[test]
    fn test_http_timeout_must_be_positive() {
        // ---
        let err = load(&vars(&[("HTTP_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("HTTP_TIMEOUT_SECS"));

        let cfg = load(&vars(&[("HTTP_TIMEOUT_SECS", "5")])).unwrap();
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_mask() {
        // ---
        assert_eq!(mask("abcdef12"), "****12");
        assert_eq!(mask("ist_0123456789"), "****789");
        assert_eq!(mask("0123456789abcdef0123"), "****0123");
        assert_eq!(mask("abc"), "****");
    }
}
