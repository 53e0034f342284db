//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use pv_array_sim::circuit::{ArrayLayout, CircuitModel, DeviceParams, OperatingPoint};
use pv_array_sim::sim::clock::VirtualClock;
use pv_array_sim::sim::controller::MpptController;
use pv_array_sim::sim::engine::Engine;
use pv_array_sim::timezone::{FixedTimeZone, Location, ResolvedLocation};
use pv_array_sim::weather::{self, SimWindow, SyntheticTmySource, WeatherSeries};

/// Gaithersburg, Maryland.
pub const LATITUDE: f64 = 39.13;
pub const LONGITUDE: f64 = -77.21;

/// Speed used by the end-to-end scenario.
pub const SPEED: f64 = 4096.0;

/// Gaithersburg pinned to `America/New_York` without a polygon lookup.
pub fn gaithersburg() -> ResolvedLocation {
    Location::new(LATITUDE, LONGITUDE)
        .and_then(|loc| loc.resolve(&FixedTimeZone::new("America/New_York")))
        .expect("gaithersburg should resolve")
}

/// Synthetic weather for `start`..`end` month-day strings at Gaithersburg.
pub fn synthetic_series(start: &str, end: &str) -> WeatherSeries {
    let window = SimWindow::from_month_day(start, end).expect("window should parse");
    weather::fetch(&SyntheticTmySource::new(42), &gaithersburg(), &window)
        .expect("synthetic weather should cover the window")
}

/// The August 24 to September 7 window.
pub fn default_series() -> WeatherSeries {
    synthetic_series("August 24", "September 7")
}

/// Single CS5P-220M module with a 0.5 V tracker starting at 0 V.
pub fn default_engine(series: WeatherSeries) -> Engine {
    let clock = VirtualClock::new(series, SPEED).expect("valid speed");
    let model = CircuitModel::new(DeviceParams::default(), ArrayLayout::default())
        .expect("valid layout");
    let tracker = MpptController::with_initial(OperatingPoint::new(0.0, 0.0), 0.5)
        .expect("valid step");
    Engine::new(clock, model, tracker)
}
