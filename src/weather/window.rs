//! Date windows for a simulation run.

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::SimError;

use super::REFERENCE_YEAR;

/// The `[start, end)` range a run covers.
///
/// A naive window is wall-clock time at the array's location and is localized
/// when weather is fetched. An aware window already pins exact instants.
/// Both are coerced onto the reference year, so only month, day and time of
/// day matter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimWindow {
    Naive {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    Aware {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl SimWindow {
    /// A wall-clock window, localized later against the location timezone.
    pub fn naive(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        SimWindow::Naive { start, end }
    }

    /// A window of exact instants in any timezone.
    pub fn aware<Z: TimeZone>(start: DateTime<Z>, end: DateTime<Z>) -> Self {
        SimWindow::Aware {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        }
    }

    /// Builds a naive window from two month-day strings such as
    /// `"August 24"` or `"08-24"` / `"08-24T06:00"`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if either bound cannot be parsed.
    pub fn from_month_day(start: &str, end: &str) -> Result<Self, SimError> {
        Ok(SimWindow::naive(
            parse_month_day(start, "window.start")?,
            parse_month_day(end, "window.end")?,
        ))
    }

    /// Resolves the window to local instants in the reference year.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `end <= start` after coercion.
    pub fn localize(&self, tz: Tz) -> Result<(DateTime<Tz>, DateTime<Tz>), SimError> {
        let (start, end) = match *self {
            SimWindow::Naive { start, end } => (start, end),
            SimWindow::Aware { start, end } => (
                start.with_timezone(&tz).naive_local(),
                end.with_timezone(&tz).naive_local(),
            ),
        };
        let start = localize_naive(coerce_naive_year(start)?, tz);
        let end = localize_naive(coerce_naive_year(end)?, tz);
        if end <= start {
            return Err(SimError::invalid("window.end", "must be after window.start"));
        }
        Ok((start, end))
    }
}

/// Parses a month-day bound into a naive datetime in the reference year.
pub fn parse_month_day(text: &str, field: &str) -> Result<NaiveDateTime, SimError> {
    let text = text.trim();
    let long_form = format!("{text} {REFERENCE_YEAR}");
    if let Ok(date) = NaiveDate::parse_from_str(&long_form, "%B %d %Y") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    let iso = format!("{REFERENCE_YEAR}-{text}");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&iso, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    Err(SimError::invalid(
        field,
        format!("\"{text}\" is not a month-day like \"August 24\" or \"08-24T06:00\""),
    ))
}

fn coerce_naive_year(dt: NaiveDateTime) -> Result<NaiveDateTime, SimError> {
    dt.with_year(REFERENCE_YEAR).ok_or_else(|| {
        SimError::invalid("window", format!("{dt} has no equivalent in {REFERENCE_YEAR}"))
    })
}

/// Attaches `tz` to a wall-clock time.
///
/// An ambiguous time (clocks falling back) resolves to standard time, the
/// later instant; a time skipped by a spring-forward gap moves one hour on.
pub(crate) fn localize_naive(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(_, latest) => latest,
        LocalResult::None => {
            let shifted = naive + TimeDelta::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(_, dt) => dt,
                LocalResult::None => tz.from_utc_datetime(&naive),
            }
        }
    }
}
