//! Weather data sources producing raw hourly UTC records.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::SimError;
use crate::timezone::Location;

/// One hourly record as delivered by a source, timestamped in UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    pub timestamp: DateTime<Utc>,
    /// Global horizontal irradiance (W/m²).
    pub ghi: f64,
    /// Ambient air temperature (°C).
    pub temp_air: f64,
}

/// Trait for anything that can supply a year of hourly TMY records.
///
/// Fetching is synchronous and happens once, before the first clock tick.
pub trait WeatherSource {
    /// Returns the hourly records for `location`.
    ///
    /// # Errors
    ///
    /// Returns `DataUnavailable` if the source has nothing for the location.
    fn fetch_hourly(&self, location: &Location) -> Result<Vec<RawRecord>, SimError>;

    /// Returns a human-readable name for the source.
    fn name(&self) -> &'static str;
}

/// A fixed set of records, returned as-is for any location.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<RawRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

impl WeatherSource for InMemorySource {
    fn fetch_hourly(&self, location: &Location) -> Result<Vec<RawRecord>, SimError> {
        if self.records.is_empty() {
            return Err(no_data(location, "in-memory source is empty".to_string()));
        }
        Ok(self.records.clone())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// TMY records exported to CSV for a single site.
///
/// Expects a header row `time_utc,ghi,temp_air`. Timestamps may be RFC 3339
/// (`2007-01-01T00:00:00Z`) or the PVGIS form `20070101:0000`.
#[derive(Debug, Clone)]
pub struct CsvTmySource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    time_utc: String,
    ghi: f64,
    temp_air: f64,
}

impl CsvTmySource {
    pub fn from_path(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Parses CSV records from any reader.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed row.
    pub fn parse(reader: impl Read) -> Result<Vec<RawRecord>, String> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();
        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| format!("row {}: {e}", line + 1))?;
            let timestamp = parse_utc(&row.time_utc)
                .ok_or_else(|| format!("row {}: bad timestamp \"{}\"", line + 1, row.time_utc))?;
            records.push(RawRecord {
                timestamp,
                ghi: row.ghi.max(0.0),
                temp_air: row.temp_air,
            });
        }
        Ok(records)
    }
}

impl WeatherSource for CsvTmySource {
    fn fetch_hourly(&self, location: &Location) -> Result<Vec<RawRecord>, SimError> {
        let file = File::open(&self.path).map_err(|e| {
            no_data(
                location,
                format!("cannot read \"{}\": {e}", self.path.display()),
            )
        })?;
        let records = Self::parse(file).map_err(|e| no_data(location, e))?;
        if records.is_empty() {
            return Err(no_data(
                location,
                format!("\"{}\" has no records", self.path.display()),
            ));
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

/// Parses RFC 3339 or PVGIS `YYYYMMDD:HHMM` timestamps as UTC.
pub(crate) fn parse_utc(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y%m%d:%H%M")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn no_data(location: &Location, reason: String) -> SimError {
    SimError::DataUnavailable {
        latitude: location.latitude,
        longitude: location.longitude,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn loc() -> Location {
        Location::new(39.13, -77.21).expect("valid location")
    }

    #[test]
    fn parses_both_timestamp_forms() {
        let a = parse_utc("2007-01-01T05:00:00Z").expect("rfc3339");
        let b = parse_utc("20070101:0500").expect("pvgis");
        assert_eq!(a, b);
        assert_eq!(a.hour(), 5);
        assert!(parse_utc("yesterday").is_none());
    }

    #[test]
    fn csv_rows_become_records() {
        let data = "time_utc,ghi,temp_air\n\
                    20120801:1200,812.5,28.1\n\
                    2012-08-01T13:00:00Z, 790.0 ,28.4\n";
        let records = CsvTmySource::parse(data.as_bytes()).expect("valid csv");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp.year(), 2012);
        assert_eq!(records[1].ghi, 790.0);
    }

    #[test]
    fn negative_irradiance_is_clipped() {
        let data = "time_utc,ghi,temp_air\n20120801:0200,-3.0,18.0\n";
        let records = CsvTmySource::parse(data.as_bytes()).expect("valid csv");
        assert_eq!(records[0].ghi, 0.0);
    }

    #[test]
    fn bad_row_reports_its_number() {
        let data = "time_utc,ghi,temp_air\n20120801:1200,1,2\nnot-a-time,1,2\n";
        let err = CsvTmySource::parse(data.as_bytes()).err().unwrap_or_default();
        assert!(err.contains("row 2"), "got {err}");
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let source = CsvTmySource::from_path(Path::new("/nonexistent/tmy.csv"));
        assert!(matches!(
            source.fetch_hourly(&loc()),
            Err(SimError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn empty_in_memory_source_is_data_unavailable() {
        assert!(matches!(
            InMemorySource::default().fetch_hourly(&loc()),
            Err(SimError::DataUnavailable { .. })
        ));
    }
}
