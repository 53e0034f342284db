//! Error taxonomy shared by every simulation component.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Nothing is swallowed inside the crate: every failure propagates to the
/// driver, which decides whether to abort the run or report it.
#[derive(Debug, Error)]
pub enum SimError {
    /// The weather source returned no usable data for the location.
    #[error("no weather data available for ({latitude}, {longitude}): {reason}")]
    DataUnavailable {
        latitude: f64,
        longitude: f64,
        reason: String,
    },
    /// The location resolves to no known IANA timezone.
    #[error("no timezone found for ({latitude}, {longitude})")]
    UnknownTimezone { latitude: f64, longitude: f64 },
    /// Interpolation was requested outside the fetched weather slice.
    #[error("timestamp {requested} is outside the weather slice [{first}, {last}]")]
    OutOfRange {
        requested: NaiveDateTime,
        first: NaiveDateTime,
        last: NaiveDateTime,
    },
    /// A construction-time parameter violates its constraint.
    #[error("invalid configuration: {field} {message}")]
    InvalidConfiguration { field: String, message: String },
    /// The clock was ticked or played with no weather slice loaded.
    #[error("no weather series loaded; arm the clock before ticking")]
    NoWeatherLoaded,
}

impl SimError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        SimError::InvalidConfiguration {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
