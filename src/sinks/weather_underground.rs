//! Weather Underground personal weather station upload.
//!
//! Uses the PWS "updateraw" GET protocol. The service answers with a short
//! text body; it is logged but not interpreted, so any response that makes it
//! back over HTTP counts as delivered.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use tracing::debug;

use super::{Sink, SinkError};
use crate::config::WeatherUndergroundConfig;
use crate::models::{Reading, ReadingField};

// ---

/// The timestamp is consumed only as a marker: the PWS protocol is sent the
/// literal `dateutc=now` and the service stamps the observation itself.
const FIELDS: &[ReadingField] = &[
    ReadingField::TempF,
    ReadingField::HumidityPct,
    ReadingField::PressureInHg,
    ReadingField::Timestamp,
];

pub struct WeatherUnderground {
    client: Client,
    config: WeatherUndergroundConfig,
}

impl WeatherUnderground {
    pub fn new(client: Client, config: WeatherUndergroundConfig) -> Self {
        WeatherUnderground { client, config }
    }

    /// Query parameters for one upload. The station clock is trusted, so the
    /// timestamp is always `now`.
    fn query(&self, reading: &Reading) -> Vec<(&'static str, String)> {
        // ---
        vec![
            ("action", "updateraw".to_string()),
            ("ID", self.config.station_id.clone()),
            ("PASSWORD", self.config.station_key.clone()),
            ("dateutc", "now".to_string()),
            ("tempf", format!("{:.1}", reading.temp_f)),
            ("humidity", format!("{:.0}", reading.humidity_pct)),
            ("baromin", format!("{:.1}", reading.pressure_inhg)),
        ]
    }

    async fn upload(&self, reading: &Reading) -> Result<(), SinkError> {
        // ---
        let response = self
            .client
            .get(&self.config.url)
            .query(&self.query(reading))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, "Weather Underground response: {}", body.trim());

        Ok(())
    }
}

impl Sink for WeatherUnderground {
    fn id(&self) -> &str {
        "weather-underground"
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
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_query_fields() {
        // ---
        let sink = WeatherUnderground::new(
            Client::new(),
            WeatherUndergroundConfig {
                station_id: "KCASANFR123".to_string(),
                station_key: "secret".to_string(),
                url: "http://localhost/update".to_string(),
            },
        );
        let reading = Reading::new(
            22.4,
            47.6,
            1013.25,
            0.0295300,
            Utc.with_ymd_and_hms(2025, 3, 26, 18, 40, 0).unwrap(),
        );

        let query = sink.query(&reading);
        let get = |key: &str| query.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("action"), Some("updateraw"));
        assert_eq!(get("ID"), Some("KCASANFR123"));
        assert_eq!(get("PASSWORD"), Some("secret"));
        assert_eq!(get("dateutc"), Some("now"));
        assert_eq!(get("tempf"), Some("72.3"));
        assert_eq!(get("humidity"), Some("48"));
        assert_eq!(get("baromin"), Some("29.9"));

        // the reading's own timestamp is never put on the wire
        assert!(sink.consumes().contains(&ReadingField::Timestamp));
        assert!(query.iter().all(|(_, v)| !v.contains("2025")));
    }
}
