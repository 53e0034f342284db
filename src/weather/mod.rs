use chrono::{DateTime, Datelike, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::error::SimError;
use crate::timezone::ResolvedLocation;

#[cfg(feature = "pvgis")]
pub mod pvgis;
pub mod source;
pub mod synthetic;
pub mod window;

pub use source::{CsvTmySource, InMemorySource, RawRecord, WeatherSource};
pub use synthetic::SyntheticTmySource;
pub use window::SimWindow;

/// Synthetic calendar year every TMY timestamp is coerced onto.
///
/// A leap year, so a February 29 record from any source year survives.
pub const REFERENCE_YEAR: i32 = 2000;

/// Hours of data kept on each side of the requested window.
pub const SLICE_PAD_HOURS: i64 = 3;

/// Length of [`REFERENCE_YEAR`].
const REFERENCE_YEAR_DAYS: i64 = 366;

/// Hours copied across the year boundary when a full year is present.
const WRAP_HOURS: usize = 48;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// One localized hourly weather observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherPoint {
    pub timestamp: DateTime<Tz>,
    /// Global horizontal irradiance (W/m²).
    pub ghi: f64,
    /// Ambient air temperature (°C).
    pub temp_air: f64,
}

/// Result of interpolating the series at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolated {
    /// Interpolated position on the time axis, in epoch seconds.
    pub x: f64,
    /// Irradiance (W/m²).
    pub ghi: f64,
    /// Ambient temperature (°C).
    pub temp_air: f64,
}

/// The bounded, localized slice of TMY data backing one run.
///
/// Points are strictly increasing in time. Lookups never extrapolate: asking
/// for an instant without two bracketing points is an `OutOfRange` error.
#[derive(Debug, Clone)]
pub struct WeatherSeries {
    tz: Tz,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    points: Vec<WeatherPoint>,
}

impl WeatherSeries {
    /// Builds a series from already-localized points.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `end <= start` or the points are
    /// empty or not strictly increasing.
    pub fn from_points(
        tz: Tz,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        points: Vec<WeatherPoint>,
    ) -> Result<Self, SimError> {
        if end <= start {
            return Err(SimError::invalid("window.end", "must be after window.start"));
        }
        if points.is_empty() {
            return Err(SimError::invalid("weather.points", "must not be empty"));
        }
        if points.windows(2).any(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(SimError::invalid(
                "weather.points",
                "timestamps must be strictly increasing",
            ));
        }
        Ok(Self {
            tz,
            start,
            end,
            points,
        })
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Localized `(start, end)` of the requested window.
    pub fn window(&self) -> (DateTime<Tz>, DateTime<Tz>) {
        (self.start, self.end)
    }

    pub fn points(&self) -> &[WeatherPoint] {
        &self.points
    }

    /// Returns `true` if every instant in `[start, end]` can be interpolated.
    pub fn covers(&self, start: &DateTime<Tz>, end: &DateTime<Tz>) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => first.timestamp <= *start && *end < last.timestamp,
            _ => false,
        }
    }

    /// Replaces the requested window, keeping the points.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `end <= start`, or `OutOfRange` if
    /// the slice does not cover the new window.
    pub fn with_window(mut self, start: DateTime<Tz>, end: DateTime<Tz>) -> Result<Self, SimError> {
        if end <= start {
            return Err(SimError::invalid("window.end", "must be after window.start"));
        }
        if !self.covers(&start, &end) {
            return Err(self.out_of_range(&start));
        }
        self.start = start;
        self.end = end;
        Ok(self)
    }

    /// Interpolates irradiance and temperature at `at`.
    ///
    /// The bracketing pair is the last point at or before `at` and the point
    /// after it. The time axis is interpolated first from the fractional hour
    /// of `at`, then each value is read back off the line through the pair:
    ///
    /// ```text
    /// seek = (epoch(at) mod 3600) / 3600
    /// X    = x1 + (x2 - x1) * seek
    /// Y    = y2 + (y2 - y1) * (X - x2) / (x2 - x1)
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if no bracketing pair exists.
    pub fn interpolate_at<Z: TimeZone>(&self, at: &DateTime<Z>) -> Result<Interpolated, SimError> {
        let at = at.with_timezone(&self.tz);
        let idx = self.points.partition_point(|p| p.timestamp <= at);
        if idx == 0 || idx >= self.points.len() {
            return Err(self.out_of_range(&at));
        }
        let p1 = &self.points[idx - 1];
        let p2 = &self.points[idx];

        let seek = epoch_seconds(&at).rem_euclid(SECONDS_PER_HOUR) / SECONDS_PER_HOUR;
        let x1 = epoch_seconds(&p1.timestamp);
        let x2 = epoch_seconds(&p2.timestamp);
        let x = x1 + (x2 - x1) * seek;

        Ok(Interpolated {
            x,
            ghi: read_back(x, x1, p1.ghi, x2, p2.ghi),
            temp_air: read_back(x, x1, p1.temp_air, x2, p2.temp_air),
        })
    }

    fn out_of_range(&self, at: &DateTime<Tz>) -> SimError {
        let first = self.points.first().map(|p| p.timestamp.naive_local());
        let last = self.points.last().map(|p| p.timestamp.naive_local());
        SimError::OutOfRange {
            requested: at.naive_local(),
            first: first.unwrap_or_default(),
            last: last.unwrap_or_default(),
        }
    }
}

fn read_back(x: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    y2 + (y2 - y1) * (x - x2) / (x2 - x1)
}

fn epoch_seconds<Z: TimeZone>(dt: &DateTime<Z>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}

/// Fetches a full TMY year for `place` and cuts the slice backing `window`.
///
/// A full year is treated as cyclic: the padded slice of a window touching
/// January 1 or December 31 continues into the other end of the year.
///
/// # Errors
///
/// * `DataUnavailable` - the source has no data, or the data cannot cover
///   the padded window without gaps
/// * `InvalidConfiguration` - the window ends before it starts
pub fn fetch(
    source: &dyn WeatherSource,
    place: &ResolvedLocation,
    window: &SimWindow,
) -> Result<WeatherSeries, SimError> {
    let loc = place.location;
    let raw = source.fetch_hourly(&loc)?;
    info!(
        source = source.name(),
        records = raw.len(),
        latitude = loc.latitude,
        longitude = loc.longitude,
        "fetched TMY records"
    );
    let records = wrap_year_edges(coerce_year(raw, place)?);

    let (start, end) = window.localize(place.tz)?;
    let pad = TimeDelta::hours(SLICE_PAD_HOURS);
    let lo = start.with_timezone(&Utc) - pad;
    let hi = end.with_timezone(&Utc) + pad;

    let slice: Vec<&RawRecord> = records
        .iter()
        .filter(|r| r.timestamp >= lo && r.timestamp <= hi)
        .collect();

    let (Some(first), Some(last)) = (slice.first(), slice.last()) else {
        return Err(unavailable(place, "no records inside the requested window"));
    };
    if first.timestamp > start.with_timezone(&Utc) || last.timestamp <= end.with_timezone(&Utc) {
        return Err(unavailable(place, "records do not cover the requested window"));
    }
    if slice
        .windows(2)
        .any(|w| w[1].timestamp - w[0].timestamp != TimeDelta::hours(1))
    {
        return Err(unavailable(place, "records inside the window are not hourly"));
    }

    let points = slice
        .into_iter()
        .map(|r| WeatherPoint {
            timestamp: round_to_nearest_hour(r.timestamp.with_timezone(&place.tz)),
            ghi: r.ghi,
            temp_air: r.temp_air,
        })
        .collect::<Vec<_>>();

    debug!(
        points = points.len(),
        first = %points[0].timestamp,
        last = %points[points.len() - 1].timestamp,
        "cut weather slice"
    );
    WeatherSeries::from_points(place.tz, start, end, points)
}

/// Moves every record onto [`REFERENCE_YEAR`] and sorts them.
///
/// TMY data stitches months from different real years, so only month, day
/// and time are meaningful. A set with February 28 but no February 29 gets
/// February 29 as a copy of February 28. Coercing an already-coerced set is
/// a no-op.
///
/// # Errors
///
/// Returns `DataUnavailable` if the input is empty or two records collapse
/// onto the same instant.
pub fn coerce_year(
    records: Vec<RawRecord>,
    place: &ResolvedLocation,
) -> Result<Vec<RawRecord>, SimError> {
    if records.is_empty() {
        return Err(unavailable(place, "source returned no records"));
    }
    let mut coerced = records
        .into_iter()
        .map(|r| {
            r.timestamp
                .with_year(REFERENCE_YEAR)
                .map(|timestamp| RawRecord { timestamp, ..r })
                .ok_or_else(|| {
                    unavailable(
                        place,
                        &format!("{} has no equivalent in {REFERENCE_YEAR}", r.timestamp),
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    coerced.sort_by_key(|r| r.timestamp);
    if coerced.windows(2).any(|w| w[0].timestamp == w[1].timestamp) {
        return Err(unavailable(place, "duplicate timestamps after year coercion"));
    }
    fill_leap_day(&mut coerced);
    Ok(coerced)
}

fn fill_leap_day(records: &mut Vec<RawRecord>) {
    let on = |r: &RawRecord, day: u32| r.timestamp.month() == 2 && r.timestamp.day() == day;
    if records.iter().any(|r| on(r, 29)) {
        return;
    }
    let copies = records
        .iter()
        .filter(|r| on(r, 28))
        .map(|r| RawRecord {
            timestamp: r.timestamp + TimeDelta::days(1),
            ..*r
        })
        .collect::<Vec<_>>();
    if copies.is_empty() {
        return;
    }
    debug!(hours = copies.len(), "filled February 29 from February 28");
    records.extend(copies);
    records.sort_by_key(|r| r.timestamp);
}

/// Extends a year running from January 1 to December 31 by [`WRAP_HOURS`]
/// on both sides, so the hour after December 31 23:00 is January 1 00:00.
fn wrap_year_edges(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let full_year = match (records.first(), records.last()) {
        (Some(first), Some(last)) => {
            first.timestamp.ordinal() == 1
                && last.timestamp.month() == 12
                && last.timestamp.day() == 31
        }
        _ => false,
    };
    if !full_year {
        return records;
    }
    let year = TimeDelta::days(REFERENCE_YEAR_DAYS);
    let n = records.len().min(WRAP_HOURS);
    let before = records[records.len() - n..].iter().map(|r| RawRecord {
        timestamp: r.timestamp - year,
        ..*r
    });
    let after = records[..n].iter().map(|r| RawRecord {
        timestamp: r.timestamp + year,
        ..*r
    });
    before.chain(records.iter().copied()).chain(after).collect()
}

/// Rounds to the closest hour boundary: minute 30 and later rounds up.
pub fn round_to_nearest_hour(ts: DateTime<Tz>) -> DateTime<Tz> {
    let into_hour = TimeDelta::seconds(i64::from(ts.minute() * 60 + ts.second()))
        + TimeDelta::nanoseconds(i64::from(ts.nanosecond()));
    let floor = ts - into_hour;
    if ts.minute() >= 30 {
        floor + TimeDelta::hours(1)
    } else {
        floor
    }
}

fn unavailable(place: &ResolvedLocation, reason: &str) -> SimError {
    SimError::DataUnavailable {
        latitude: place.location.latitude,
        longitude: place.location.longitude,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timezone::{FixedTimeZone, Location};
    use chrono::NaiveDate;
    use chrono_tz::America::New_York;

    fn place() -> ResolvedLocation {
        Location::new(39.13, -77.21)
            .and_then(|l| l.resolve(&FixedTimeZone::new("America/New_York")))
            .expect("resolvable location")
    }

    fn ny(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        New_York
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("unambiguous local time")
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0)
            .single()
            .expect("valid utc")
    }

    fn rec(timestamp: DateTime<Utc>, ghi: f64) -> RawRecord {
        RawRecord {
            timestamp,
            ghi,
            temp_air: 0.0,
        }
    }

    fn point(ts: DateTime<Tz>, ghi: f64) -> WeatherPoint {
        WeatherPoint {
            timestamp: ts,
            ghi,
            temp_air: 20.0,
        }
    }

    fn two_point_series(p1: WeatherPoint, p2: WeatherPoint) -> WeatherSeries {
        WeatherSeries::from_points(New_York, p1.timestamp, p2.timestamp, vec![p1, p2])
            .expect("valid series")
    }

    #[test]
    fn uniform_hourly_midpoint_is_exact() {
        let h = ny(2000, 8, 24, 12, 0, 0);
        let series = two_point_series(point(h, 100.0), point(h + TimeDelta::hours(1), 300.0));
        let r = series
            .interpolate_at(&(h + TimeDelta::minutes(30)))
            .expect("inside slice");
        assert_eq!(r.ghi, 200.0);
        assert_eq!(r.x, epoch_seconds(&h) + 1800.0);
    }

    #[test]
    fn non_uniform_spacing_follows_time_then_value_form() {
        let h = ny(2000, 8, 24, 12, 0, 0);
        let p1 = point(h, 100.0);
        let p2 = point(h + TimeDelta::minutes(90), 300.0);
        let series = two_point_series(p1, p2);
        let at = h + TimeDelta::minutes(30);
        let r = series.interpolate_at(&at).expect("inside slice");

        let x1 = epoch_seconds(&p1.timestamp);
        let x2 = epoch_seconds(&p2.timestamp);
        let seek = epoch_seconds(&at).rem_euclid(3600.0) / 3600.0;
        let x = x1 + (x2 - x1) * seek;
        let expected = 300.0 + (300.0 - 100.0) * (x - x2) / (x2 - x1);
        assert_eq!(r.ghi, expected);
        assert_eq!(r.ghi, 200.0);
        // elapsed-time interpolation would give 100 + 200 * 30 / 90
        let by_elapsed = 100.0 + 200.0 * 30.0 / 90.0;
        assert!((r.ghi - by_elapsed).abs() > 1.0);
    }

    #[test]
    fn temperature_is_interpolated_alongside_irradiance() {
        let h = ny(2000, 8, 24, 12, 0, 0);
        let mut p1 = point(h, 0.0);
        let mut p2 = point(h + TimeDelta::hours(1), 0.0);
        p1.temp_air = 20.0;
        p2.temp_air = 24.0;
        let series = two_point_series(p1, p2);
        let r = series
            .interpolate_at(&(h + TimeDelta::minutes(15)))
            .expect("inside slice");
        assert!((r.temp_air - 21.0).abs() < 1e-12);
    }

    #[test]
    fn exact_point_hits_that_point() {
        let h = ny(2000, 8, 24, 12, 0, 0);
        let series = two_point_series(point(h, 100.0), point(h + TimeDelta::hours(1), 300.0));
        let r = series.interpolate_at(&h).expect("inside slice");
        assert_eq!(r.ghi, 100.0);
    }

    #[test]
    fn outside_slice_is_out_of_range() {
        let h = ny(2000, 8, 24, 12, 0, 0);
        let series = two_point_series(point(h, 100.0), point(h + TimeDelta::hours(1), 300.0));
        assert!(matches!(
            series.interpolate_at(&(h - TimeDelta::minutes(1))),
            Err(SimError::OutOfRange { .. })
        ));
        assert!(matches!(
            series.interpolate_at(&(h + TimeDelta::hours(1))),
            Err(SimError::OutOfRange { .. })
        ));
    }

    #[test]
    fn from_points_rejects_unordered() {
        let h = ny(2000, 8, 24, 12, 0, 0);
        let res = WeatherSeries::from_points(
            New_York,
            h,
            h + TimeDelta::hours(1),
            vec![point(h + TimeDelta::hours(1), 1.0), point(h, 1.0)],
        );
        assert!(matches!(res, Err(SimError::InvalidConfiguration { .. })));
    }

    #[test]
    fn rounding_rule_half_hour_goes_up() {
        assert_eq!(
            round_to_nearest_hour(ny(2000, 8, 24, 12, 29, 59)),
            ny(2000, 8, 24, 12, 0, 0)
        );
        assert_eq!(
            round_to_nearest_hour(ny(2000, 8, 24, 12, 30, 0)),
            ny(2000, 8, 24, 13, 0, 0)
        );
        assert_eq!(
            round_to_nearest_hour(ny(2000, 8, 24, 0, 0, 1)),
            ny(2000, 8, 24, 0, 0, 0)
        );
    }

    #[test]
    fn coercion_moves_everything_to_reference_year() {
        let records = vec![
            rec(utc(2012, 2, 1, 0), 1.0),
            rec(utc(2007, 1, 1, 0), 2.0),
        ];
        let coerced = coerce_year(records, &place()).expect("coercible");
        assert!(coerced.iter().all(|r| r.timestamp.year() == REFERENCE_YEAR));
        // sorted after coercion: January before February
        assert_eq!(coerced[0].ghi, 2.0);
    }

    #[test]
    fn coercion_is_idempotent() {
        let records = vec![
            rec(utc(2016, 2, 29, 5), 1.0),
            rec(utc(2009, 6, 1, 0), 2.0),
        ];
        let once = coerce_year(records, &place()).expect("coercible");
        let twice = coerce_year(once.clone(), &place()).expect("coercible");
        assert_eq!(once, twice);
    }

    #[test]
    fn coercion_rejects_collisions() {
        let records = vec![
            rec(utc(2012, 3, 1, 0), 1.0),
            rec(utc(2007, 3, 1, 0), 2.0),
        ];
        assert!(matches!(
            coerce_year(records, &place()),
            Err(SimError::DataUnavailable { .. })
        ));
    }

    fn hourly_year(source_year: i32) -> Vec<RawRecord> {
        let start = utc(source_year, 8, 20, 0);
        (0..24 * 25)
            .map(|h| RawRecord {
                timestamp: start + TimeDelta::hours(h),
                ghi: f64::from(h as i32 % 24) * 10.0,
                temp_air: 25.0,
            })
            .collect()
    }

    fn window() -> SimWindow {
        let d = |m, day| {
            NaiveDate::from_ymd_opt(2023, m, day)
                .and_then(|x| x.and_hms_opt(0, 0, 0))
                .expect("valid")
        };
        SimWindow::naive(d(8, 24), d(9, 7))
    }

    #[test]
    fn fetch_slices_with_padding_and_localizes() {
        let source = InMemorySource::new(hourly_year(2011));
        let series = fetch(&source, &place(), &window()).expect("fetchable");
        let (start, end) = series.window();
        let first = series.points()[0].timestamp;
        let last = series.points()[series.points().len() - 1].timestamp;
        assert_eq!(first, start - TimeDelta::hours(SLICE_PAD_HOURS));
        assert_eq!(last, end + TimeDelta::hours(SLICE_PAD_HOURS));
        assert_eq!(first.timezone(), New_York);
    }

    #[test]
    fn fetch_is_independent_of_source_year() {
        let a = fetch(&InMemorySource::new(hourly_year(2005)), &place(), &window())
            .expect("fetchable");
        let b = fetch(&InMemorySource::new(hourly_year(2014)), &place(), &window())
            .expect("fetchable");
        assert_eq!(a.points(), b.points());
    }

    #[test]
    fn fetch_with_no_records_is_data_unavailable() {
        let source = InMemorySource::new(Vec::new());
        assert!(matches!(
            fetch(&source, &place(), &window()),
            Err(SimError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn fetch_outside_data_is_data_unavailable() {
        let d = |m, day| {
            NaiveDate::from_ymd_opt(2000, m, day)
                .and_then(|x| x.and_hms_opt(0, 0, 0))
                .expect("valid")
        };
        let source = InMemorySource::new(hourly_year(2011));
        let w = SimWindow::naive(d(1, 1), d(1, 3));
        assert!(matches!(
            fetch(&source, &place(), &w),
            Err(SimError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn with_window_rejects_uncovered_range() {
        let source = InMemorySource::new(hourly_year(2011));
        let series = fetch(&source, &place(), &window()).expect("fetchable");
        let (start, _) = series.window();
        let res = series.with_window(start, start + TimeDelta::days(60));
        assert!(matches!(res, Err(SimError::OutOfRange { .. })));
    }

    fn assert_hourly(series: &WeatherSeries) {
        assert!(
            series
                .points()
                .windows(2)
                .all(|w| w[1].timestamp - w[0].timestamp == TimeDelta::hours(1))
        );
    }

    #[test]
    fn missing_leap_day_is_copied_from_february_28() {
        let records = (0..48)
            .map(|h| rec(utc(2007, 2, 28, 0) + TimeDelta::hours(h), f64::from(h as i32)))
            .collect();
        let coerced = coerce_year(records, &place()).expect("coercible");
        assert_eq!(coerced.len(), 72);
        let leap = coerced
            .iter()
            .find(|r| r.timestamp == utc(2000, 2, 29, 5))
            .expect("february 29 filled");
        assert_eq!(leap.ghi, 5.0);
        assert!(
            coerced
                .windows(2)
                .all(|w| w[1].timestamp - w[0].timestamp == TimeDelta::hours(1))
        );
        // already has february 29, so nothing more is added
        let again = coerce_year(coerced.clone(), &place()).expect("coercible");
        assert_eq!(again, coerced);
    }

    #[test]
    fn window_across_leap_day_fetches_from_synthetic_year() {
        let w = SimWindow::from_month_day("February 20", "March 10").expect("window");
        let series = fetch(&SyntheticTmySource::new(42), &place(), &w).expect("fetchable");
        assert_hourly(&series);
        let (start, end) = series.window();
        assert_eq!(end - start, TimeDelta::days(19));
    }

    #[test]
    fn window_at_year_end_wraps_into_january() {
        let w = SimWindow::from_month_day("December 24", "12-31T23:00").expect("window");
        let series = fetch(&SyntheticTmySource::new(42), &place(), &w).expect("fetchable");
        assert_hourly(&series);
        let (_, end) = series.window();
        let last = series.points()[series.points().len() - 1].timestamp;
        assert_eq!(last, end + TimeDelta::hours(SLICE_PAD_HOURS));
        assert!(series.interpolate_at(&end).is_ok());
    }

    #[test]
    fn january_start_east_of_utc_wraps_into_december() {
        let sydney = Location::new(-33.87, 151.21)
            .and_then(|l| l.resolve(&FixedTimeZone::new("Australia/Sydney")))
            .expect("resolvable location");
        let w = SimWindow::from_month_day("January 1", "January 3").expect("window");
        let series = fetch(&SyntheticTmySource::new(7), &sydney, &w).expect("fetchable");
        assert_hourly(&series);
        let (start, _) = series.window();
        assert_eq!(
            series.points()[0].timestamp,
            start - TimeDelta::hours(SLICE_PAD_HOURS)
        );
    }
}
