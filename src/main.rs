//! Application entry point for the `pistation` weather station.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Locating the Sense HAT sensors and the LED matrix
//! - Building the enabled telemetry sinks
//! - Running the sampling/upload scheduler until interrupted
//!
//! Any failure before the scheduler starts is returned from `main`, which
//! exits with status 1. SIGINT or SIGTERM stops the scheduler and exits
//! with status 0.
//!
//! # Environment Variables
//! See [`pistation::config::load_from_env`] for the station settings, plus:
//! - `PISTATION_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `PISTATION_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – force colored log output on or off
use std::env;

use anyhow::{Context, Result};
use chrono::Local;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use pistation::config;
use pistation::display::{Framebuffer, LogDisplay, MatrixDisplay};
use pistation::sensor::SenseHat;
use pistation::sinks::build_sinks;
use pistation::{ScheduleSettings, Scheduler};

// ---

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    tracing::info!("########################################");
    tracing::info!("# Raspberry Pi Weather Station         #");
    tracing::info!("########################################");

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let sinks = build_sinks(&cfg)?;

    tracing::info!("Initializing the Sense HAT");
    let sensor = SenseHat::open(&cfg.iio_dir, &cfg.cpu_temp_path)
        .context("Unable to initialize the Sense HAT")?;

    let display: Box<dyn MatrixDisplay> = match &cfg.framebuffer {
        Some(path) => Box::new(Framebuffer::new(path)),
        None => Box::new(LogDisplay),
    };

    let mut scheduler = Scheduler::start(
        sensor,
        display,
        sinks,
        ScheduleSettings::from(&cfg),
        Local::now(),
    )
    .context("Unable to take the initial Sense HAT reading")?;

    tracing::info!("Initialization complete!");

    tokio::select! {
        _ = scheduler.run() => {}
        _ = shutdown_signal() => {
            tracing::info!("Exiting application");
        }
    }

    Ok(())
}

// ---

/// Resolve on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `PISTATION_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `PISTATION_LOG_LEVEL` env var (default
///   `debug`, which shows the per-sample console line). The HTTP stack is
///   held back so sink traffic doesn't drown the station's own output:
///   `hyper`/`hyper_util` and `rustls` at `warn`, `reqwest` at `info`.
///   `RUST_LOG`, when set, replaces the whole filter.
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("PISTATION_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to PISTATION_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("PISTATION_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=warn,hyper_util=warn,reqwest=info,rustls=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
