//! Initial State event stream upload.
//!
//! A stream is opened against a bucket (created on the fly if it does not
//! exist yet), events are logged into it and the stream is closed, which
//! flushes the buffered events in one request. Close always runs once the
//! stream is open, even if logging an event failed.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use super::{Sink, SinkError};
use crate::config::InitialStateConfig;
use crate::models::{Reading, ReadingField};

// ---

const FIELDS: &[ReadingField] = &[
    ReadingField::TempC,
    ReadingField::HumidityPct,
    ReadingField::PressureHpa,
    ReadingField::Timestamp,
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Bucket<'a> {
    bucket_key: &'a str,
    bucket_name: &'a str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Event {
    key: String,
    value: f64,
    epoch: f64,
}

pub struct InitialState {
    client: Client,
    config: InitialStateConfig,
    location: Option<String>,
}

/// An open stream buffering events until [`Stream::close`].
struct Stream<'a> {
    sink: &'a InitialState,
    events: Vec<Event>,
}

impl InitialState {
    pub fn new(client: Client, config: InitialStateConfig, location: Option<String>) -> Self {
        InitialState {
            client,
            config,
            location,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        // ---
        self.client
            .post(format!("{}/{}", self.config.api_url.trim_end_matches('/'), path))
            .header("X-IS-AccessKey", &self.config.access_key)
            .header("Accept-Version", "~0")
    }

    fn label(&self, icon: &str, name: &str) -> String {
        match &self.location {
            Some(location) => format!("{} {} {}", icon, location, name),
            None => format!("{} {}", icon, name),
        }
    }

    /// The three labeled values sent for each reading.
    fn events(&self, reading: &Reading) -> [(String, f64); 3] {
        [
            (self.label(":sunny:", "Temperature (C)"), reading.temp_c),
            (self.label(":sweat_drops:", "Humidity (%)"), reading.humidity_pct),
            (self.label(":cloud:", "Pressure (hPa)"), reading.pressure_hpa),
        ]
    }

    async fn open(&self) -> Result<Stream<'_>, SinkError> {
        // ---
        let bucket = Bucket {
            bucket_key: &self.config.bucket_key,
            bucket_name: &self.config.bucket_name,
        };
        self.post("buckets")
            .json(&bucket)
            .send()
            .await?
            .error_for_status()?;

        debug!("Initial State stream open for bucket {}", self.config.bucket_name);
        Ok(Stream {
            sink: self,
            events: Vec::new(),
        })
    }

    async fn upload(&self, reading: &Reading) -> Result<(), SinkError> {
        // ---
        let epoch = reading.timestamp.timestamp_millis() as f64 / 1000.0;

        let mut stream = self.open().await?;
        let logged = self
            .events(reading)
            .into_iter()
            .try_for_each(|(key, value)| stream.log(key, value, epoch));
        let closed = stream.close().await;

        match (logged, closed) {
            (Err(e), Err(close)) => {
                warn!("Initial State close failed after a logging error: {}", close);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), closed) => closed,
        }
    }
}

impl Stream<'_> {
    fn log(&mut self, key: String, value: f64, epoch: f64) -> Result<(), SinkError> {
        // ---
        if !value.is_finite() {
            return Err(SinkError::InvalidValue { label: key, value });
        }
        self.events.push(Event { key, value, epoch });
        Ok(())
    }

    async fn flush(&self) -> Result<(), reqwest::Error> {
        // ---
        if self.events.is_empty() {
            return Ok(());
        }

        self.sink
            .post("events")
            .header("X-IS-BucketKey", &self.sink.config.bucket_key)
            .json(&self.events)
            .send()
            .await?
            .error_for_status()?;

        debug!("Initial State flushed {} events", self.events.len());
        Ok(())
    }

    async fn close(self) -> Result<(), SinkError> {
        self.flush().await.map_err(SinkError::Close)
    }
}

impl Sink for InitialState {
    fn id(&self) -> &str {
        "initial-state"
    }

    fn consumes(&self) -> &'static [ReadingField] {
        FIELDS
    }

    fn send<'a>(&'a self, reading: &'a Reading) -> BoxFuture<'a, Result<(), SinkError>> {
        self.upload(reading).boxed()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn sink(location: Option<&str>) -> InitialState {
        // ---
        InitialState::new(
            Client::new(),
            InitialStateConfig {
                bucket_name: "Backyard".to_string(),
                bucket_key: "backyard-pi".to_string(),
                access_key: "ist_key".to_string(),
                api_url: "http://localhost/api/".to_string(),
            },
            location.map(String::from),
        )
    }

    #[test]
    fn test_labels() {
        // ---
        assert_eq!(sink(None).label(":cloud:", "Pressure (hPa)"), ":cloud: Pressure (hPa)");
        assert_eq!(
            sink(Some("Garden")).label(":sunny:", "Temperature (C)"),
            ":sunny: Garden Temperature (C)"
        );
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        // ---
        let sink = sink(None);
        let mut stream = Stream {
            sink: &sink,
            events: Vec::new(),
        };

        assert!(stream.log("ok".to_string(), 1.0, 0.0).is_ok());
        let err = stream.log("bad".to_string(), f64::NAN, 0.0).unwrap_err();
        assert!(matches!(err, SinkError::InvalidValue { ref label, .. } if label == "bad"));
        assert_eq!(stream.events.len(), 1);
    }
}
