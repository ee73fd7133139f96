//! Telemetry sinks and the dispatcher that fans a reading out to them.
//!
//! This module is the gateway for the individual sink implementations, which
//! live in sibling files and only export their sink type. The scheduler only
//! sees the [`Sink`] trait, [`dispatch`] and [`build_sinks`].
//!
//! Every sink is attempted exactly once per upload tick, in order. A failing
//! or panicking sink is recorded in its [`SinkResult`] and never keeps the
//! remaining sinks from running.

use std::panic::AssertUnwindSafe;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{Reading, ReadingField};

mod initial_state;
mod weather_underground;

pub use initial_state::InitialState;
pub use weather_underground::WeatherUnderground;

// ---

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to close stream: {0}")]
    Close(#[source] reqwest::Error),

    #[error("refusing to send non-finite value {value} for '{label}'")]
    InvalidValue { label: String, value: f64 },

    #[error("sink panicked: {0}")]
    Panicked(String),
}

/// An external telemetry endpoint.
pub trait Sink: Send + Sync {
    /// Short stable name used in logs and results.
    fn id(&self) -> &str;

    /// Reading fields this sink uploads.
    fn consumes(&self) -> &'static [ReadingField];

    /// Upload one reading. Connections opened here must be released before
    /// the returned future completes, on success and on failure.
    fn send<'a>(&'a self, reading: &'a Reading) -> BoxFuture<'a, Result<(), SinkError>>;
}

#[derive(Debug)]
pub enum SinkOutcome {
    Ok,
    Failed(SinkError),
}

#[derive(Debug)]
pub struct SinkResult {
    pub sink_id: String,
    pub outcome: SinkOutcome,
}

impl SinkResult {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, SinkOutcome::Ok)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    // ---
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Send `reading` to every sink in order, isolating each sink's failure.
pub async fn dispatch(reading: &Reading, sinks: &[Box<dyn Sink>]) -> Vec<SinkResult> {
    // ---
    let mut results = Vec::with_capacity(sinks.len());

    for sink in sinks {
        info!("Uploading data to {}", sink.id());

        let attempt = AssertUnwindSafe(async { sink.send(reading).await }).catch_unwind();
        let outcome = match attempt.await {
            Ok(Ok(())) => SinkOutcome::Ok,
            Ok(Err(e)) => {
                warn!(sink = sink.id(), "Upload failed: {}", e);
                SinkOutcome::Failed(e)
            }
            Err(payload) => {
                let e = SinkError::Panicked(panic_message(payload.as_ref()));
                warn!(sink = sink.id(), "Upload failed: {}", e);
                SinkOutcome::Failed(e)
            }
        };

        results.push(SinkResult {
            sink_id: sink.id().to_string(),
            outcome,
        });
    }

    results
}

/// Build the enabled sinks from configuration, sharing one HTTP client.
pub fn build_sinks(cfg: &Config) -> Result<Vec<Box<dyn Sink>>> {
    // ---
    let client = reqwest::Client::builder()
        .timeout(cfg.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    match &cfg.weather_underground {
        Some(wu) => sinks.push(Box::new(WeatherUnderground::new(client.clone(), wu.clone()))),
        None => info!("Skipping Weather Underground upload (WU_UPLOAD is off)"),
    }

    match &cfg.initial_state {
        Some(is) => sinks.push(Box::new(InitialState::new(
            client,
            is.clone(),
            cfg.location_name.clone(),
        ))),
        None => info!("Skipping Initial State upload (IS_UPLOAD is off)"),
    }

    for sink in &sinks {
        info!(fields = ?sink.consumes(), "Sink enabled: {}", sink.id());
    }

    Ok(sinks)
}
