//! # Sun and Moon Times
//!
//! Computes sunrise/sunset and moonrise/moonset for the observer's location
//! and caches them per calendar day. The clock ticks every second, but the
//! astronomy only changes when the date does, so [`AstronomyCache::update`]
//! does real work at most once per day key and coordinate pair.
//!
//! ## Failure handling
//! - Missing coordinates are not an error: results are cleared and the chips
//!   show a "set latitude/longitude" placeholder.
//! - A failing calculation is logged and clears both results. The day key is
//!   still recorded, so a broken calculation is not retried (and re-logged)
//!   on every tick.

use crate::config::Coordinates;
use crate::time_source::Moment;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, error};

pub use crate::lunar::MoonTimes;

/// Errors from an astronomy calculation.
#[derive(Error, Debug)]
pub enum AstronomyError {
    #[error("coordinates ({latitude}, {longitude}) are not valid")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("{0} calculation produced a non-finite value")]
    NonFinite(&'static str),
}

/// Sun events for one day. `None` when the event doesn't happen (polar day or night).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SunTimes {
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

/// Capability contract for sun and moon event calculation.
pub trait AstronomyProvider {
    /// Sunrise and sunset on a calendar date.
    fn sun_times(&self, date: NaiveDate, at: Coordinates) -> Result<SunTimes, AstronomyError>;

    /// Moonrise and moonset in the 24 hours after `day_start` (local midnight).
    fn moon_times(
        &self,
        day_start: DateTime<Utc>,
        at: Coordinates,
    ) -> Result<MoonTimes, AstronomyError>;
}

/// Default provider: the `sunrise` crate for the sun, [`crate::lunar`] for the moon.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkyCalculator;

/// Reject results the solver produces when an event does not occur on `date`.
fn event_on_day(event: DateTime<Utc>, date: NaiveDate) -> Option<DateTime<Utc>> {
    let noon = date.and_hms_opt(12, 0, 0)?.and_utc();
    ((event - noon).num_seconds().abs() <= Duration::hours(36).num_seconds()).then_some(event)
}

impl AstronomyProvider for SkyCalculator {
    fn sun_times(&self, date: NaiveDate, at: Coordinates) -> Result<SunTimes, AstronomyError> {
        use sunrise::{Coordinates as SolarCoordinates, SolarDay, SolarEvent};

        let coord = SolarCoordinates::new(at.latitude, at.longitude).ok_or(
            AstronomyError::InvalidCoordinates {
                latitude: at.latitude,
                longitude: at.longitude,
            },
        )?;
        let solar_day = SolarDay::new(coord, date);
        let sunrise = solar_day.event_time(SolarEvent::Sunrise);
        let sunset = solar_day.event_time(SolarEvent::Sunset);

        Ok(SunTimes {
            sunrise: event_on_day(sunrise, date),
            sunset: event_on_day(sunset, date),
        })
    }

    fn moon_times(
        &self,
        day_start: DateTime<Utc>,
        at: Coordinates,
    ) -> Result<MoonTimes, AstronomyError> {
        if !crate::lunar::moon_altitude(day_start, at.latitude, at.longitude).is_finite() {
            return Err(AstronomyError::NonFinite("moon altitude"));
        }
        Ok(crate::lunar::moon_times(
            day_start,
            at.latitude,
            at.longitude,
        ))
    }
}

/// Sun and moon results handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AstroSnapshot {
    pub sun: Option<SunTimes>,
    pub moon: Option<MoonTimes>,
}

/// Per-day cache in front of an [`AstronomyProvider`].
pub struct AstronomyCache {
    provider: Box<dyn AstronomyProvider>,
    day_key: Option<String>,
    coordinates: Option<Coordinates>,
    snapshot: AstroSnapshot,
    computations: u64,
}

impl Default for AstronomyCache {
    fn default() -> Self {
        Self::new(Box::new(SkyCalculator))
    }
}

impl AstronomyCache {
    pub fn new(provider: Box<dyn AstronomyProvider>) -> Self {
        Self {
            provider,
            day_key: None,
            coordinates: None,
            snapshot: AstroSnapshot::default(),
            computations: 0,
        }
    }

    /// Refresh for `now`, recomputing only when the day key or coordinates changed.
    pub fn update(&mut self, now: &Moment, coordinates: Option<Coordinates>) -> AstroSnapshot {
        let day_key = now.day_key();

        let Some(at) = coordinates else {
            self.snapshot = AstroSnapshot::default();
            self.coordinates = None;
            self.day_key = Some(day_key);
            return self.snapshot;
        };

        if self.day_key.as_deref() == Some(day_key.as_str()) && self.coordinates == Some(at) {
            return self.snapshot;
        }

        self.computations += 1;
        self.snapshot = match self.compute(now, at) {
            Ok(snapshot) => {
                debug!(
                    "Astronomy for {} at ({:.3}, {:.3}): {:?}",
                    day_key, at.latitude, at.longitude, snapshot
                );
                snapshot
            }
            Err(e) => {
                error!("Failed to calculate sun/moon times for {}: {}", day_key, e);
                AstroSnapshot::default()
            }
        };
        self.coordinates = Some(at);
        self.day_key = Some(day_key);
        self.snapshot
    }

    fn compute(&self, now: &Moment, at: Coordinates) -> Result<AstroSnapshot, AstronomyError> {
        let sun = self.provider.sun_times(now.date(), at)?;
        let moon = self.provider.moon_times(now.start_of_day(), at)?;
        Ok(AstroSnapshot {
            sun: Some(sun),
            moon: Some(moon),
        })
    }

    pub fn snapshot(&self) -> AstroSnapshot {
        self.snapshot
    }

    /// Day key of the last update, with or without coordinates.
    pub fn day_key(&self) -> Option<&str> {
        self.day_key.as_deref()
    }

    /// How many times the provider has been asked to calculate.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}
