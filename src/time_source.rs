//! # Time Source
//!
//! Produces the timezone-resolved [`Moment`] the widget renders every tick.
//!
//! The time provider is injected rather than read from global state. A
//! [`TimeSource`] owns a primary provider plus an explicit fallback slot:
//!
//! - [`ZonedClock`]: system clock with the chrono-tz database (default)
//! - [`LocalClock`]: system clock without timezone support
//! - [`SystemClock`]: minimal built-in clock straight from `std::time::SystemTime`,
//!   UTC only; always available and used as the fallback
//! - [`ManualClock`]: frozen, steppable clock for tests and `--at`
//!
//! Degradation is silent after the first occurrence: a missing timezone
//! capability or a failing primary clock is logged once per source, never per tick.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use std::cell::Cell;
use std::rc::Rc;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};

/// Failures a time provider can report.
#[derive(Error, Debug)]
pub enum TimeError {
    #[error("{0} clock is unavailable")]
    Unavailable(&'static str),

    #[error("system time is before the unix epoch")]
    BeforeEpoch,

    #[error("timestamp out of range")]
    OutOfRange,

    #[error("invalid datetime '{0}', expected YYYY-MM-DD HH:MM:SS")]
    InvalidDateTime(String),
}

/// A timezone-resolved point in time.
///
/// Carries the named zone it was resolved in, when there is one, so that
/// day boundaries follow that zone's offset changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    at: DateTime<FixedOffset>,
    zone: Option<Tz>,
}

impl Moment {
    pub fn new(utc: DateTime<Utc>, offset: FixedOffset) -> Self {
        Moment {
            at: utc.with_timezone(&offset),
            zone: None,
        }
    }

    /// Moment resolved through a named zone.
    pub fn in_zone(utc: DateTime<Utc>, tz: Tz) -> Self {
        let offset = tz.offset_from_utc_datetime(&utc.naive_utc()).fix();
        Moment {
            at: utc.with_timezone(&offset),
            zone: Some(tz),
        }
    }

    pub fn datetime(&self) -> DateTime<FixedOffset> {
        self.at
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.at.with_timezone(&Utc)
    }

    pub fn offset(&self) -> FixedOffset {
        *self.at.offset()
    }

    pub fn zone(&self) -> Option<Tz> {
        self.zone
    }

    /// Calendar date in the moment's own timezone.
    pub fn date(&self) -> NaiveDate {
        self.at.date_naive()
    }

    /// `YYYY-MM-DD` key used to detect calendar-day boundaries.
    pub fn day_key(&self) -> String {
        let date = self.date();
        format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
    }

    pub fn hour(&self) -> u32 {
        self.at.hour()
    }

    pub fn minute(&self) -> u32 {
        self.at.minute()
    }

    pub fn second(&self) -> u32 {
        self.at.second()
    }

    /// Milliseconds into the current second, clamped so leap seconds stay below 1000.
    pub fn millisecond(&self) -> u32 {
        self.at.timestamp_subsec_millis().min(999)
    }

    /// Local midnight of this moment's calendar day, as a UTC instant.
    ///
    /// With a named zone, midnight is resolved through the zone so a day that
    /// changes offset (DST) still starts at the right instant. If midnight
    /// itself is skipped by a transition, the current offset is used.
    pub fn start_of_day(&self) -> DateTime<Utc> {
        self.zone
            .and_then(|tz| {
                let midnight = self.date().and_hms_opt(0, 0, 0)?;
                tz.from_local_datetime(&midnight).earliest()
            })
            .map(|start| start.with_timezone(&Utc))
            .unwrap_or_else(|| {
                self.utc()
                    - Duration::seconds(i64::from(self.at.num_seconds_from_midnight()))
                    - Duration::nanoseconds(i64::from(self.at.nanosecond()))
            })
    }
}

/// Capability contract for "what time is it".
pub trait TimeProvider {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    fn now_utc(&self) -> Result<DateTime<Utc>, TimeError>;

    /// Whether named IANA timezones can be applied to this provider's times
    fn supports_timezones(&self) -> bool {
        false
    }

    /// Offset of the provider's notion of local time at `at`
    fn local_offset(&self, at: DateTime<Utc>) -> FixedOffset;
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// System clock with the full timezone database.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZonedClock;

impl TimeProvider for ZonedClock {
    fn name(&self) -> &'static str {
        "zoned"
    }

    fn now_utc(&self) -> Result<DateTime<Utc>, TimeError> {
        Ok(Utc::now())
    }

    fn supports_timezones(&self) -> bool {
        true
    }

    fn local_offset(&self, at: DateTime<Utc>) -> FixedOffset {
        Local.offset_from_utc_datetime(&at.naive_utc()).fix()
    }
}

/// System local time only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl TimeProvider for LocalClock {
    fn name(&self) -> &'static str {
        "local"
    }

    fn now_utc(&self) -> Result<DateTime<Utc>, TimeError> {
        Ok(Utc::now())
    }

    fn local_offset(&self, at: DateTime<Utc>) -> FixedOffset {
        Local.offset_from_utc_datetime(&at.naive_utc()).fix()
    }
}

/// Bare `SystemTime` clock. Knows nothing about zones and reports UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn name(&self) -> &'static str {
        "system"
    }

    fn now_utc(&self) -> Result<DateTime<Utc>, TimeError> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TimeError::BeforeEpoch)?;
        DateTime::from_timestamp(
            since_epoch.as_secs() as i64,
            since_epoch.subsec_nanos(),
        )
        .ok_or(TimeError::OutOfRange)
    }

    fn local_offset(&self, _at: DateTime<Utc>) -> FixedOffset {
        utc_offset()
    }
}

/// Clock whose time only moves when told to.
///
/// Clones share the same instant, so a test can keep a handle and step
/// the clock while the widget owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    instant: Rc<Cell<DateTime<Utc>>>,
    local_offset: FixedOffset,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            instant: Rc::new(Cell::new(start)),
            local_offset: utc_offset(),
        }
    }

    /// Use a fixed offset as this clock's local time.
    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = offset;
        self
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.instant.set(instant);
    }

    pub fn advance(&self, by: Duration) {
        self.instant.set(self.instant.get() + by);
    }

    pub fn get(&self) -> DateTime<Utc> {
        self.instant.get()
    }
}

impl TimeProvider for ManualClock {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn now_utc(&self) -> Result<DateTime<Utc>, TimeError> {
        Ok(self.instant.get())
    }

    fn supports_timezones(&self) -> bool {
        true
    }

    fn local_offset(&self, _at: DateTime<Utc>) -> FixedOffset {
        self.local_offset
    }
}

/// Parse a UTC datetime in the format "YYYY-MM-DD HH:MM:SS"
pub fn parse_utc_datetime(s: &str) -> Result<DateTime<Utc>, TimeError> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeError::InvalidDateTime(s.to_string()))
}

#[derive(Debug, Clone)]
enum Zone {
    Local,
    Named(Tz),
    Unknown(String),
}

/// Resolves "now" in the configured timezone with graceful fallback.
pub struct TimeSource {
    primary: Box<dyn TimeProvider>,
    fallback: Box<dyn TimeProvider>,
    zone: Zone,
    using_fallback: bool,
    tz_warned: bool,
    fallback_warned: bool,
}

impl TimeSource {
    pub fn new(timezone: Option<&str>, primary: Box<dyn TimeProvider>) -> Self {
        let zone = match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            None => Zone::Local,
            Some(id) => match Tz::from_str(id) {
                Ok(tz) => Zone::Named(tz),
                Err(_) => Zone::Unknown(id.to_string()),
            },
        };
        info!(
            "Time source: {} clock, zone {}",
            primary.name(),
            timezone.unwrap_or("local")
        );
        Self {
            primary,
            fallback: Box::new(SystemClock),
            zone,
            using_fallback: false,
            tz_warned: false,
            fallback_warned: false,
        }
    }

    /// Replace the provider used when the primary cannot produce a time.
    pub fn with_fallback(mut self, fallback: Box<dyn TimeProvider>) -> Self {
        self.fallback = fallback;
        self
    }

    /// True when the last `now()` had to use the fallback provider.
    pub fn is_degraded(&self) -> bool {
        self.using_fallback
    }

    /// Current moment in the configured zone. Never fails.
    pub fn now(&mut self) -> Moment {
        let utc = match self.primary.now_utc() {
            Ok(utc) => {
                self.using_fallback = false;
                utc
            }
            Err(e) => {
                if !self.fallback_warned {
                    error!(
                        "{} clock failed ({}); falling back to {} clock",
                        self.primary.name(),
                        e,
                        self.fallback.name()
                    );
                    self.fallback_warned = true;
                }
                self.using_fallback = true;
                self.fallback.now_utc().unwrap_or_default()
            }
        };
        self.localize(utc)
    }

    /// Apply the configured zone to an arbitrary instant.
    pub fn localize(&mut self, utc: DateTime<Utc>) -> Moment {
        let provider = if self.using_fallback {
            self.fallback.as_ref()
        } else {
            self.primary.as_ref()
        };

        let offset = match &self.zone {
            Zone::Local => provider.local_offset(utc),
            Zone::Named(tz) if provider.supports_timezones() => return Moment::in_zone(utc, *tz),
            Zone::Named(tz) => {
                if !self.tz_warned {
                    warn!(
                        "{} clock has no timezone support; using local time instead of {}",
                        provider.name(),
                        tz
                    );
                    self.tz_warned = true;
                }
                provider.local_offset(utc)
            }
            Zone::Unknown(id) => {
                if !self.tz_warned {
                    warn!("Unknown timezone '{}'; using local time", id);
                    self.tz_warned = true;
                }
                provider.local_offset(utc)
            }
        };
        Moment::new(utc, offset)
    }
}
