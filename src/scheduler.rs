//! Two-speed sampling and upload loop.
//!
//! Ticks are derived from wall-clock time rather than a fixed-period timer so
//! the station stays aligned with minute boundaries however long an upload
//! takes:
//! - a *fast tick* on every second that is a multiple of the sample interval
//!   reads the sensors and feeds the smoother;
//! - an *upload tick*, evaluated inside a fast tick, fires on the first fast
//!   tick of a minute that is a multiple of the upload interval.
//!
//! Everything runs on one task. Sensor reads block in-line and sinks are
//! awaited one after another, so an upload always sees the smoothed value
//! from the fast tick that triggered it.

use std::time::Duration;

use chrono::{DateTime, Local, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::compensation::Calibration;
use crate::config::Config;
use crate::display::{DisplayCommand, MatrixDisplay};
use crate::models::{display_temp, RawSample, Reading, UnitSystem};
use crate::sensor::{SensorError, SensorSource};
use crate::sinks::{dispatch, Sink, SinkResult};
use crate::smoother::Smoother;
use crate::trend::{classify, Trend};

// ---

/// Cadence and calibration inputs of the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub upload_interval_min: u32,
    pub sample_interval_sec: u32,
    pub units: UnitSystem,
    pub calibration: Calibration,
}

impl From<&Config> for ScheduleSettings {
    fn from(cfg: &Config) -> Self {
        ScheduleSettings {
            upload_interval_min: cfg.upload_interval_min,
            sample_interval_sec: cfg.sample_interval_sec,
            units: cfg.units,
            calibration: cfg.calibration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerState {
    pub last_minute_seen: u32,
    /// Last uploaded temperature, rounded, in the configured unit system.
    pub last_uploaded_temp: f64,
}

/// Result of one upload tick.
#[derive(Debug)]
pub struct Upload {
    pub reading: Reading,
    pub trend: Trend,
    pub results: Vec<SinkResult>,
}

/// What a single loop iteration did.
#[derive(Debug)]
pub enum Tick {
    Idle,
    Sampled,
    SampleSkipped,
    Uploaded(Upload),
}

pub fn is_fast_tick(second: u32, sample_interval_sec: u32) -> bool {
    second == 0 || second % sample_interval_sec == 0
}

pub fn is_upload_minute(minute: u32, upload_interval_min: u32) -> bool {
    minute == 0 || minute % upload_interval_min == 0
}

/// The minute before `minute`, wrapping at the top of the hour.
fn previous_minute(minute: u32) -> u32 {
    (minute + 59) % 60
}

/// Time left until the next whole wall-clock second.
fn until_next_second(now: DateTime<Local>) -> Duration {
    let nanos = now.timestamp_subsec_nanos().min(999_999_999);
    Duration::from_nanos(u64::from(1_000_000_000 - nanos))
}

pub struct Scheduler<S, D> {
    sensor: S,
    display: D,
    sinks: Vec<Box<dyn Sink>>,
    settings: ScheduleSettings,
    smoother: Smoother,
    smoothed_temp: f64,
    latest: RawSample,
    state: SchedulerState,
    last_sample_at: Option<i64>,
}

impl<S, D> Scheduler<S, D>
where
    S: SensorSource,
    D: MatrixDisplay,
{
    /// Show the init splash, take one synchronous reading to seed the
    /// smoother and the trend baseline, and arm the minute gate so the first
    /// qualifying minute after `now` is not missed.
    ///
    /// A sensor failure here is fatal to the caller.
    pub fn start(
        mut sensor: S,
        mut display: D,
        sinks: Vec<Box<dyn Sink>>,
        settings: ScheduleSettings,
        now: DateTime<Local>,
    ) -> Result<Self, SensorError> {
        // ---
        display.render(DisplayCommand::InitMessage);
        display.render(DisplayCommand::Clear);

        let latest = sensor.sample()?;
        let mut smoother = Smoother::new();
        let smoothed_temp = smoother.push(settings.calibration.corrected_temp(&latest));

        let state = SchedulerState {
            last_minute_seen: previous_minute(now.minute()),
            last_uploaded_temp: display_temp(smoothed_temp, settings.units),
        };
        info!("Current temperature reading: {}", state.last_uploaded_temp);

        Ok(Scheduler {
            sensor,
            display,
            sinks,
            settings,
            smoother,
            smoothed_temp,
            latest,
            state,
            last_sample_at: None,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn smoothed_temp(&self) -> f64 {
        self.smoothed_temp
    }

    /// Poll forever, once per wall-clock second.
    pub async fn run(&mut self) {
        // ---
        info!(
            "Sampling every {} s, uploading every {} min",
            self.settings.sample_interval_sec, self.settings.upload_interval_min
        );
        loop {
            self.tick(Local::now()).await;
            tokio::time::sleep(until_next_second(Local::now())).await;
        }
    }

    /// Evaluate both tick conditions for `now`.
    pub async fn tick(&mut self, now: DateTime<Local>) -> Tick {
        // ---
        let second = now.timestamp();
        if !is_fast_tick(now.second(), self.settings.sample_interval_sec)
            || self.last_sample_at == Some(second)
        {
            return Tick::Idle;
        }
        self.last_sample_at = Some(second);

        if let Err(e) = self.sample() {
            warn!("Skipping sample: {}", e);
            return Tick::SampleSkipped;
        }

        let minute = now.minute();
        if minute == self.state.last_minute_seen {
            return Tick::Sampled;
        }
        self.state.last_minute_seen = minute;

        if !is_upload_minute(minute, self.settings.upload_interval_min) {
            return Tick::Sampled;
        }

        Tick::Uploaded(self.upload(now).await)
    }

    fn sample(&mut self) -> Result<(), SensorError> {
        // ---
        let sample = self.sensor.sample()?;
        let corrected = self.settings.calibration.corrected_temp(&sample);
        self.smoothed_temp = self.smoother.push(corrected);
        self.latest = sample;

        let reading = self.snapshot(Utc::now());
        match self.settings.units {
            UnitSystem::Metric => debug!(
                "Temp: {}C ({}F), Pressure: {} hPa, Humidity: {}%",
                reading.temp_c, reading.temp_f, reading.pressure_hpa, reading.humidity_pct
            ),
            UnitSystem::Imperial => debug!(
                "Temp: {}F ({}C), Pressure: {} inHg, Humidity: {}%",
                reading.temp_f, reading.temp_c, reading.pressure_inhg, reading.humidity_pct
            ),
        }
        Ok(())
    }

    fn snapshot(&self, timestamp: DateTime<Utc>) -> Reading {
        Reading::new(
            self.smoothed_temp,
            self.latest.humidity_pct,
            self.latest.pressure_hpa,
            self.settings.calibration.pressure_inhg_factor,
            timestamp,
        )
    }

    async fn upload(&mut self, now: DateTime<Local>) -> Upload {
        // ---
        info!(
            "{} minute mark ({} @ {})",
            self.settings.upload_interval_min,
            now.minute(),
            now
        );

        let reading = self.snapshot(now.with_timezone(&Utc));
        let current = reading.temp_in(self.settings.units);
        let trend = classify(self.state.last_uploaded_temp, current);
        self.display.render(trend.display_command());

        // Updated before dispatch: the trend tracks what was measured, not
        // what the sinks accepted.
        self.state.last_uploaded_temp = current;

        let results = dispatch(&reading, &self.sinks).await;
        let delivered = results.iter().filter(|r| r.is_ok()).count();
        info!(?trend, "Upload complete: {}/{} sinks delivered", delivered, results.len());

        Upload {
            reading,
            trend,
            results,
        }
    }
}
