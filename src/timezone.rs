//! Geographic locations and their IANA timezones.

use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

use crate::error::SimError;

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Creates a location after checking both coordinates are in range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if latitude is outside `[-90, 90]` or
    /// longitude is outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SimError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SimError::invalid("location.latitude", "must be in [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SimError::invalid(
                "location.longitude",
                "must be in [-180, 180]",
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Looks the timezone up once and caches it alongside the coordinates.
    pub fn resolve(self, resolver: &dyn TimeZoneResolver) -> Result<ResolvedLocation, SimError> {
        let tz = resolver.resolve(&self)?;
        Ok(ResolvedLocation { location: self, tz })
    }
}

/// A location paired with the timezone it resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLocation {
    pub location: Location,
    pub tz: Tz,
}

/// Maps coordinates to an IANA timezone.
pub trait TimeZoneResolver {
    /// # Errors
    ///
    /// Returns `UnknownTimezone` when no zone covers the coordinates.
    fn resolve(&self, location: &Location) -> Result<Tz, SimError>;
}

/// Polygon lookup over the bundled timezone boundary data.
pub struct TzfResolver {
    finder: DefaultFinder,
}

impl TzfResolver {
    /// Loads the boundary data. This is relatively slow; build one resolver
    /// and reuse it.
    pub fn new() -> Self {
        Self {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for TzfResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeZoneResolver for TzfResolver {
    fn resolve(&self, location: &Location) -> Result<Tz, SimError> {
        let name = self
            .finder
            .get_tz_name(location.longitude, location.latitude);
        parse_tz(name, location)
    }
}

/// A resolver that always answers with one configured zone.
///
/// Used when the scenario names its timezone explicitly.
#[derive(Debug, Clone)]
pub struct FixedTimeZone {
    name: String,
}

impl FixedTimeZone {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TimeZoneResolver for FixedTimeZone {
    fn resolve(&self, location: &Location) -> Result<Tz, SimError> {
        parse_tz(&self.name, location)
    }
}

fn parse_tz(name: &str, location: &Location) -> Result<Tz, SimError> {
    if name.is_empty() {
        return Err(SimError::UnknownTimezone {
            latitude: location.latitude,
            longitude: location.longitude,
        });
    }
    name.parse::<Tz>().map_err(|_| SimError::UnknownTimezone {
        latitude: location.latitude,
        longitude: location.longitude,
    })
}
