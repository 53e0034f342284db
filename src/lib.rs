//! Photovoltaic array simulator driven by typical-meteorological-year weather.

/// Single-diode equivalent circuit, DeSoto correction and I-V solver.
pub mod circuit;
pub mod config;
pub mod error;
pub mod io;
pub mod runner;
/// Virtual clock, MPPT controller, engine and run summary.
pub mod sim;
pub mod timezone;
/// TMY weather retrieval, year coercion and interpolation.
pub mod weather;

pub use error::SimError;
