//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::circuit::{ArrayLayout, DeviceParams};
use crate::error::SimError;
use crate::sim::controller::DEFAULT_STEP_V;
use crate::timezone::{FixedTimeZone, Location, TimeZoneResolver, TzfResolver};
use crate::weather::window::parse_month_day;
use crate::weather::{CsvTmySource, SimWindow, SyntheticTmySource, WeatherSource};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the Gaithersburg scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::gaithersburg`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Clock speed and driver cadence.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Array site.
    #[serde(default)]
    pub location: LocationConfig,
    /// Month-day range to simulate.
    #[serde(default)]
    pub window: WindowConfig,
    /// DeSoto reference constants for one module.
    #[serde(default)]
    pub module: DeviceParams,
    /// Series/parallel wiring.
    #[serde(default)]
    pub array: ArrayLayout,
    /// Tracker settings.
    #[serde(default)]
    pub mppt: MpptConfig,
    /// Where TMY data comes from.
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Clock speed and driver cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Simulated seconds per wall-clock second (must be > 0).
    pub speed: f64,
    /// Wall-clock time between driver ticks (ms, must be > 0).
    pub tick_interval_ms: u64,
    /// Stop after this many ticks even if the window has not ended.
    pub max_ticks: Option<usize>,
    /// Sleep between ticks instead of advancing a virtual wall clock.
    pub realtime: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed: 4096.0,
            tick_interval_ms: 100,
            max_ticks: None,
            realtime: false,
        }
    }
}

/// Array site.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationConfig {
    /// Decimal degrees, north positive.
    pub latitude: f64,
    /// Decimal degrees, east positive.
    pub longitude: f64,
    /// IANA zone overriding the coordinate lookup.
    pub timezone: Option<String>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 39.13,
            longitude: -77.21,
            timezone: None,
        }
    }
}

/// Month-day range to simulate, e.g. `"August 24"` or `"08-24T06:00"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: "August 24".to_string(),
            end: "September 7".to_string(),
        }
    }
}

/// Tracker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MpptConfig {
    /// Voltage step per tick (V, must be > 0).
    pub step_v: f64,
    /// Starting voltage reference (V, must be >= 0).
    pub initial_voltage: f64,
}

impl Default for MpptConfig {
    fn default() -> Self {
        Self {
            step_v: DEFAULT_STEP_V,
            initial_voltage: 0.0,
        }
    }
}

/// Where TMY data comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    /// `"synthetic"`, `"csv"` or `"pvgis"`.
    pub source: String,
    /// CSV file for the `"csv"` source.
    pub path: Option<PathBuf>,
    /// Seed for the `"synthetic"` source.
    pub seed: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            path: None,
            seed: 42,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.speed"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl From<SimError> for ConfigError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::InvalidConfiguration { field, message } => Self { field, message },
            other => Self {
                field: "scenario".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl ScenarioConfig {
    /// Gaithersburg, Maryland, late August to early September.
    pub fn gaithersburg() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            location: LocationConfig::default(),
            window: WindowConfig::default(),
            module: DeviceParams::default(),
            array: ArrayLayout::default(),
            mppt: MpptConfig::default(),
            weather: WeatherConfig::default(),
        }
    }

    /// Phoenix, Arizona, early June: hot cells and a two-module string.
    pub fn desert() -> Self {
        Self {
            location: LocationConfig {
                latitude: 33.45,
                longitude: -112.07,
                timezone: None,
            },
            window: WindowConfig {
                start: "June 1".to_string(),
                end: "June 15".to_string(),
            },
            array: ArrayLayout {
                series: 2,
                parallel: 1,
            },
            mppt: MpptConfig {
                step_v: 1.0,
                ..MpptConfig::default()
            },
            ..Self::gaithersburg()
        }
    }

    /// Sydney, Australia, southern-hemisphere summer on a 3x2 array.
    pub fn southern() -> Self {
        Self {
            location: LocationConfig {
                latitude: -33.87,
                longitude: 151.21,
                timezone: None,
            },
            window: WindowConfig {
                start: "January 5".to_string(),
                end: "January 19".to_string(),
            },
            array: ArrayLayout {
                series: 3,
                parallel: 2,
            },
            mppt: MpptConfig {
                step_v: 1.5,
                ..MpptConfig::default()
            },
            weather: WeatherConfig {
                seed: 7,
                ..WeatherConfig::default()
            },
            ..Self::gaithersburg()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["gaithersburg", "desert", "southern"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "gaithersburg" => Ok(Self::gaithersburg()),
            "desert" => Ok(Self::desert()),
            "southern" => Ok(Self::southern()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError {
                    field: field.to_string(),
                    message: message.to_string(),
                });
            }
        };

        let s = &self.simulation;
        check(s.speed.is_finite() && s.speed > 0.0, "simulation.speed", "must be > 0");
        check(s.tick_interval_ms > 0, "simulation.tick_interval_ms", "must be > 0");
        check(s.max_ticks != Some(0), "simulation.max_ticks", "must be > 0 when set");

        let loc = &self.location;
        check(
            (-90.0..=90.0).contains(&loc.latitude),
            "location.latitude",
            "must be in [-90, 90]",
        );
        check(
            (-180.0..=180.0).contains(&loc.longitude),
            "location.longitude",
            "must be in [-180, 180]",
        );
        if let Some(tz) = &loc.timezone {
            check(tz.parse::<Tz>().is_ok(), "location.timezone", "is not an IANA timezone name");
        }

        let m = &self.module;
        check(m.a_ref > 0.0, "module.a_ref", "must be > 0");
        check(m.i_l_ref > 0.0, "module.i_l_ref", "must be > 0");
        check(m.i_o_ref > 0.0, "module.i_o_ref", "must be > 0");
        check(m.r_sh_ref > 0.0, "module.r_sh_ref", "must be > 0");
        check(m.r_s >= 0.0, "module.r_s", "must be >= 0");
        check(m.eg_ref > 0.0, "module.eg_ref", "must be > 0");

        check(self.array.series >= 1, "array.series", "must be at least 1");
        check(self.array.parallel >= 1, "array.parallel", "must be at least 1");

        let mp = &self.mppt;
        check(mp.step_v.is_finite() && mp.step_v > 0.0, "mppt.step_v", "must be > 0");
        check(mp.initial_voltage >= 0.0, "mppt.initial_voltage", "must be >= 0");

        let w = &self.weather;
        match w.source.as_str() {
            "synthetic" => {}
            "csv" => check(w.path.is_some(), "weather.path", "is required for the csv source"),
            "pvgis" => check(
                cfg!(feature = "pvgis"),
                "weather.source",
                "\"pvgis\" needs the crate built with the pvgis feature",
            ),
            other => check(
                false,
                "weather.source",
                &format!("must be \"synthetic\", \"csv\" or \"pvgis\", got \"{other}\""),
            ),
        }

        match (
            parse_month_day(&self.window.start, "window.start"),
            parse_month_day(&self.window.end, "window.end"),
        ) {
            (Ok(start), Ok(end)) => {
                check(end > start, "window.end", "must be after window.start");
            }
            (start, end) => {
                for err in [start.err(), end.err()].into_iter().flatten() {
                    let err = ConfigError::from(err);
                    check(false, &err.field, &err.message);
                }
            }
        }

        errors
    }

    /// The configured site.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for out-of-range coordinates.
    pub fn site(&self) -> Result<Location, SimError> {
        Location::new(self.location.latitude, self.location.longitude)
    }

    /// The configured naive window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if a bound cannot be parsed.
    pub fn sim_window(&self) -> Result<SimWindow, SimError> {
        SimWindow::from_month_day(&self.window.start, &self.window.end)
    }

    /// The configured timezone override, or polygon lookup.
    pub fn resolver(&self) -> Box<dyn TimeZoneResolver> {
        match &self.location.timezone {
            Some(name) => Box::new(FixedTimeZone::new(name.clone())),
            None => Box::new(TzfResolver::new()),
        }
    }

    /// The configured weather source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an unknown source or missing path.
    pub fn weather_source(&self) -> Result<Box<dyn WeatherSource>, SimError> {
        let w = &self.weather;
        match w.source.as_str() {
            "synthetic" => Ok(Box::new(SyntheticTmySource::new(w.seed))),
            "csv" => {
                let path = w.path.as_deref().ok_or_else(|| {
                    SimError::invalid("weather.path", "is required for the csv source")
                })?;
                Ok(Box::new(CsvTmySource::from_path(path)))
            }
            #[cfg(feature = "pvgis")]
            "pvgis" => Ok(Box::new(crate::weather::pvgis::PvgisSource::new()?)),
            other => Err(SimError::invalid(
                "weather.source",
                format!("unsupported source \"{other}\""),
            )),
        }
    }
}
