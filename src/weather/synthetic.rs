//! Offline TMY generator with temporally correlated cloud cover.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate, TimeDelta};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::SimError;
use crate::timezone::Location;

use super::source::{RawRecord, WeatherSource, no_data};

const DEG: f64 = PI / 180.0;

/// Source year for each calendar month, the way a real TMY stitches its
/// "most typical" months together from different years.
const SOURCE_YEARS: [i32; 12] = [
    2007, 2012, 2005, 2016, 2010, 2009, 2014, 2011, 2006, 2015, 2008, 2013,
];

/// Minimum cloud multiplier (heavy overcast).
const MULTIPLIER_MIN: f64 = 0.2;
/// Maximum cloud multiplier (cloud-edge enhancement).
const MULTIPLIER_MAX: f64 = 1.1;

/// Generates a plausible year of hourly GHI and air temperature for any
/// location, without network access.
///
/// Clear-sky irradiance comes from solar geometry and the Haurwitz model.
/// A first-order autoregressive cloud multiplier scales it:
///
/// ```text
/// m(t) = alpha * m(t-1) + (1 - alpha) * (1 + epsilon(t))
/// ```
///
/// clamped to \[0.2, 1.1\]. Output is deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct SyntheticTmySource {
    /// Random seed for the cloud process.
    pub seed: u64,
    /// AR(1) correlation coefficient (0.0 = uncorrelated, 1.0 = fully persistent).
    pub alpha: f64,
    /// Standard deviation of the AR(1) innovation noise.
    pub cloud_noise_std: f64,
}

impl SyntheticTmySource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            alpha: 0.9,
            cloud_noise_std: 1.5,
        }
    }

    /// Builds the 8760 hourly records for `location`.
    pub fn generate(&self, location: &Location) -> Vec<RawRecord> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let alpha = self.alpha.clamp(0.0, 1.0);
        let mut multiplier = 1.0_f64;
        let mut records = Vec::with_capacity(8760);

        // 2001 is not a leap year, so every (month, day) exists in every source year
        let Some(mut day) = NaiveDate::from_ymd_opt(2001, 1, 1) else {
            return records;
        };
        while day.year() == 2001 {
            let year = SOURCE_YEARS[day.month0() as usize];
            let doy = f64::from(day.ordinal());
            for hour in 0..24_u32 {
                let Some(timestamp) = NaiveDate::from_ymd_opt(year, day.month(), day.day())
                    .and_then(|d| d.and_hms_opt(hour, 0, 0))
                    .map(|naive| naive.and_utc())
                else {
                    continue;
                };

                let epsilon = gaussian_noise(&mut rng, self.cloud_noise_std);
                multiplier = alpha * multiplier + (1.0 - alpha) * (1.0 + epsilon);
                multiplier = multiplier.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);

                let solar_h = solar_time_hours(location.longitude, doy, f64::from(hour));
                let cos_z = cos_zenith(location.latitude, doy, solar_h);
                let ghi = clear_sky_ghi(cos_z) * multiplier;
                let temp_air = ambient_temperature(location.latitude, doy, solar_h)
                    - if cos_z > 0.0 { 3.0 * (1.0 - multiplier).max(0.0) } else { 0.0 };

                records.push(RawRecord {
                    timestamp,
                    ghi,
                    temp_air,
                });
            }
            day += TimeDelta::days(1);
        }
        records
    }
}

impl WeatherSource for SyntheticTmySource {
    fn fetch_hourly(&self, location: &Location) -> Result<Vec<RawRecord>, SimError> {
        let records = self.generate(location);
        if records.is_empty() {
            return Err(no_data(location, "synthetic generator produced nothing".to_string()));
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

/// Gaussian noise with mean 0 via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

/// Local apparent solar time (hours) from UTC hour, longitude and day of year.
fn solar_time_hours(lon_deg: f64, doy: f64, utc_hour: f64) -> f64 {
    let b = 2.0 * PI * (doy - 1.0) / 365.0;
    // equation of time (minutes, Spencer 1971)
    let eot_min = 229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.04089 * (2.0 * b).sin());
    utc_hour + lon_deg / 15.0 + eot_min / 60.0
}

/// Cosine of the solar zenith angle.
fn cos_zenith(lat_deg: f64, doy: f64, solar_h: f64) -> f64 {
    let b = 2.0 * PI * (doy - 1.0) / 365.0;
    // declination (radians, Spencer 1971)
    let decl = 0.006918 - 0.399912 * b.cos() + 0.070257 * b.sin()
        - 0.006758 * (2.0 * b).cos()
        + 0.000907 * (2.0 * b).sin()
        - 0.002697 * (3.0 * b).cos()
        + 0.00148 * (3.0 * b).sin();
    let omega = 15.0 * (solar_h - 12.0) * DEG;
    let lat = lat_deg * DEG;
    lat.sin() * decl.sin() + lat.cos() * decl.cos() * omega.cos()
}

/// Haurwitz clear-sky global horizontal irradiance (W/m²).
fn clear_sky_ghi(cos_z: f64) -> f64 {
    if cos_z <= 0.0 {
        return 0.0;
    }
    1098.0 * cos_z * (-0.057 / cos_z).exp()
}

/// Ambient 2 m temperature (°C) from latitude band, season and hour.
fn ambient_temperature(lat_deg: f64, doy: f64, solar_h: f64) -> f64 {
    let abs_lat = lat_deg.abs();
    let (annual_mean, amplitude) = if abs_lat < 10.0 {
        (27.0, 2.0)
    } else if abs_lat < 25.0 {
        (22.0, 7.0)
    } else if abs_lat < 40.0 {
        (15.0, 12.0)
    } else if abs_lat < 55.0 {
        (8.0, 14.0)
    } else if abs_lat < 66.5 {
        (1.0, 12.0)
    } else {
        (-10.0, 12.0)
    };

    // warmest around day 200 in the north, day 20 in the south
    let season_angle = if lat_deg >= 0.0 {
        2.0 * PI * (doy - 200.0) / 365.0
    } else {
        2.0 * PI * (doy - 20.0) / 365.0
    };
    let seasonal = annual_mean + amplitude * season_angle.cos();
    let diurnal = 5.0 * (2.0 * PI * (solar_h - 14.0) / 24.0).cos();
    seasonal + diurnal
}
