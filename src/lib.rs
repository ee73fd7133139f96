//! Raspberry Pi weather station core.
//!
//! Samples the Sense HAT, compensates its temperature for CPU heat, smooths
//! it, and relays a reading to Weather Underground and Initial State on a
//! wall-clock cadence.
//!
//! Module boundaries follow the same gateway layout as the binary: `main.rs`
//! only talks to `config`, `sensor`, `display`, `sinks` and `scheduler`; the
//! numeric pieces (`compensation`, `smoother`, `trend`) are used by the
//! scheduler.

pub mod compensation;
pub mod config;
pub mod display;
pub mod models;
pub mod scheduler;
pub mod sensor;
pub mod sinks;
pub mod smoother;
pub mod trend;

pub use compensation::{compensate, Calibration};
pub use config::Config;
pub use models::{RawSample, Reading, UnitSystem};
pub use scheduler::{ScheduleSettings, Scheduler, SchedulerState, Tick};
pub use smoother::Smoother;
pub use trend::{classify, Trend};
