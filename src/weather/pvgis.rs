//! PVGIS typical-meteorological-year client.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::SimError;
use crate::timezone::Location;

use super::source::{RawRecord, WeatherSource, no_data, parse_utc};

const DEFAULT_BASE_URL: &str = "https://re.jrc.ec.europa.eu/api/v5_2/tmy";

/// Fetches hourly TMY data from the European Commission's PVGIS service.
pub struct PvgisSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TmyResponse {
    outputs: TmyOutputs,
}

#[derive(Debug, Deserialize)]
struct TmyOutputs {
    tmy_hourly: Vec<TmyHour>,
}

#[derive(Debug, Deserialize)]
struct TmyHour {
    #[serde(rename = "time(UTC)")]
    time_utc: String,
    #[serde(rename = "G(h)")]
    ghi: f64,
    #[serde(rename = "T2m")]
    temp_air: f64,
}

impl PvgisSource {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SimError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Points the client at another PVGIS-compatible endpoint.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, SimError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SimError::invalid("weather.source", format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn parse(body: &str) -> Result<Vec<RawRecord>, String> {
        let response: TmyResponse =
            serde_json::from_str(body).map_err(|e| format!("malformed response: {e}"))?;
        response
            .outputs
            .tmy_hourly
            .into_iter()
            .map(|hour| {
                let timestamp = parse_utc(&hour.time_utc)
                    .ok_or_else(|| format!("bad timestamp \"{}\"", hour.time_utc))?;
                Ok(RawRecord {
                    timestamp,
                    ghi: hour.ghi.max(0.0),
                    temp_air: hour.temp_air,
                })
            })
            .collect()
    }
}

impl WeatherSource for PvgisSource {
    fn fetch_hourly(&self, location: &Location) -> Result<Vec<RawRecord>, SimError> {
        debug!(lat = location.latitude, lon = location.longitude, "requesting PVGIS TMY");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("outputformat", "json".to_string()),
            ])
            .send()
            .map_err(|e| no_data(location, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(no_data(location, format!("PVGIS returned {status}")));
        }
        let body = response
            .text()
            .map_err(|e| no_data(location, format!("reading body: {e}")))?;
        let records = Self::parse(&body).map_err(|e| no_data(location, e))?;
        if records.is_empty() {
            return Err(no_data(location, "PVGIS returned no hours".to_string()));
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "pvgis"
    }
}
