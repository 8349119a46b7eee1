//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the glass-clock.toml file.
//! The configuration is read once at startup and handed to the widget; nothing in the
//! core mutates it afterwards.

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "glass-clock.toml";

/// Errors raised while reading or validating a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("invalid date format pattern '{0}'")]
    InvalidDateFormat(String),

    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),

    #[error("latitude and longitude must be set together")]
    IncompleteCoordinates,
}

/// 12- or 24-hour clock display.
///
/// Accepts `12`, `24`, `"12"` or `"24"` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "TimeFormatRepr", into = "u8")]
pub enum TimeFormat {
    Twelve,
    #[default]
    TwentyFour,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeFormatRepr {
    Number(i64),
    Text(String),
}

impl TryFrom<TimeFormatRepr> for TimeFormat {
    type Error = String;

    fn try_from(repr: TimeFormatRepr) -> Result<Self, Self::Error> {
        match repr {
            TimeFormatRepr::Number(12) => Ok(TimeFormat::Twelve),
            TimeFormatRepr::Number(24) => Ok(TimeFormat::TwentyFour),
            TimeFormatRepr::Text(text) if text.trim() == "12" => Ok(TimeFormat::Twelve),
            TimeFormatRepr::Text(text) if text.trim() == "24" => Ok(TimeFormat::TwentyFour),
            TimeFormatRepr::Number(n) => Err(format!("timeformat must be 12 or 24, got {n}")),
            TimeFormatRepr::Text(text) => Err(format!("timeformat must be 12 or 24, got '{text}'")),
        }
    }
}

impl From<TimeFormat> for u8 {
    fn from(format: TimeFormat) -> Self {
        match format {
            TimeFormat::Twelve => 12,
            TimeFormat::TwentyFour => 24,
        }
    }
}

/// Geographic position used for sun and moon calculations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates only when both values are usable numbers.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let usable = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        usable.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// Widget configuration loaded from glass-clock.toml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClockConfig {
    /// Clock face settings
    pub clock: ClockSettings,
    /// Which rows and parts are shown
    pub display: DisplayFlags,
    /// Observer position for sun and moon chips
    pub location: LocationConfig,
}

/// Time formatting and widget identity
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Stable per-instance id; the root node is `glass-clock-{identifier}`
    pub identifier: String,
    /// 12 or 24 hour display
    pub timeformat: TimeFormat,
    /// IANA timezone id (e.g. "Europe/Berlin"); system local time when unset
    #[serde(alias = "timeZone")]
    pub timezone: Option<String>,
    /// strftime pattern for the date row. `%o` adds the day's ordinal suffix
    pub date_format: String,
    /// Locale for month and weekday names ("de", "fr-FR", "pt_BR"); English when unset
    pub language: Option<String>,
    /// Transition length in milliseconds for full renders
    pub animation_speed: u64,
}

/// Display toggles
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayFlags {
    pub display_seconds: bool,
    pub show_period: bool,
    pub show_period_upper: bool,
    pub show_time: bool,
    pub show_date: bool,
    pub show_sun_times: bool,
    pub show_moon_times: bool,
}

/// Observer location. Both values must be present for astronomy chips.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LocationConfig {
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lon")]
    pub longitude: Option<f64>,
}

impl LocationConfig {
    /// Usable coordinates, or `None` when either value is missing or not a number.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon),
            _ => None,
        }
    }
}

impl Default for ClockSettings {
    fn default() -> Self {
        ClockSettings {
            identifier: "main".to_string(),
            timeformat: TimeFormat::TwentyFour,
            timezone: None,
            date_format: "%A, %B %-d%o".to_string(),
            language: None,
            animation_speed: 300,
        }
    }
}

impl Default for DisplayFlags {
    fn default() -> Self {
        DisplayFlags {
            display_seconds: true,
            show_period: true,
            show_period_upper: false,
            show_time: true,
            show_date: true,
            show_sun_times: false,
            show_moon_times: false,
        }
    }
}

/// Returns true when chrono accepts every item of a strftime pattern.
/// The `%o` ordinal extension is accepted too.
pub fn is_valid_date_format(pattern: &str) -> bool {
    let expanded = crate::formatter::expand_ordinal(pattern, "");
    !StrftimeItems::new(&expanded).any(|item| matches!(item, Item::Error))
}

impl ClockConfig {
    /// Load configuration from glass-clock.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!(
                        "Loaded clock configuration '{}' from {}",
                        config.clock.identifier,
                        path.display()
                    );
                    config
                }
                Err(e) => {
                    warn!("Invalid config file {}: {}", path.display(), e);
                    warn!("Using default clock configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!(
                    "No config file found at {}, using default clock configuration",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClockConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot: timezone ids, strftime patterns, coordinate ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tz) = &self.clock.timezone {
            chrono_tz::Tz::from_str(tz).map_err(|_| ConfigError::UnknownTimezone(tz.clone()))?;
        }

        if !is_valid_date_format(&self.clock.date_format) {
            return Err(ConfigError::InvalidDateFormat(
                self.clock.date_format.clone(),
            ));
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(_), None) | (None, Some(_)) => return Err(ConfigError::IncompleteCoordinates),
            _ => {}
        }
        // NaN coordinates are tolerated here and treated as "not set" later
        if let Some(lat) = self.location.latitude.filter(|v| v.is_finite()) {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ConfigError::LatitudeOutOfRange(lat));
            }
        }
        if let Some(lon) = self.location.longitude.filter(|v| v.is_finite()) {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(ConfigError::LongitudeOutOfRange(lon));
            }
        }
        Ok(())
    }

    /// Seconds are only shown when the time row itself is visible.
    pub fn shows_seconds(&self) -> bool {
        self.display.display_seconds && self.display.show_time
    }

    pub fn uses_twelve_hour(&self) -> bool {
        self.clock.timeformat == TimeFormat::Twelve
    }

    /// Id of the root node this widget instance renders into.
    pub fn root_id(&self) -> String {
        format!("glass-clock-{}", self.clock.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ClockConfig::default();
        assert_eq!(config.clock.timeformat, TimeFormat::TwentyFour);
        assert_eq!(config.clock.timezone, None);
        assert_eq!(config.clock.animation_speed, 300);
        assert!(config.display.display_seconds);
        assert!(config.display.show_period);
        assert!(!config.display.show_sun_times);
        assert!(config.location.coordinates().is_none());
        assert_eq!(config.root_id(), "glass-clock-main");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeformat_accepts_numbers_and_strings() {
        let numeric = ClockConfig::from_toml_str("[clock]\ntimeformat = 12\n").unwrap();
        assert_eq!(numeric.clock.timeformat, TimeFormat::Twelve);

        let text = ClockConfig::from_toml_str("[clock]\ntimeformat = \"24\"\n").unwrap();
        assert_eq!(text.clock.timeformat, TimeFormat::TwentyFour);

        assert!(ClockConfig::from_toml_str("[clock]\ntimeformat = 13\n").is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = ClockConfig::default();
        config.clock.timeformat = TimeFormat::Twelve;
        config.clock.language = Some("fr_FR".to_string());
        config.location.latitude = Some(51.5);
        config.location.longitude = Some(-0.12);
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = ClockConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_module_style_keys_are_accepted() {
        let config = ClockConfig::from_toml_str(
            r#"
[clock]
timeZone = "Europe/Berlin"
language = "de"

[location]
lat = 52.52
lon = 13.40
"#,
        )
        .unwrap();
        assert_eq!(config.clock.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(config.clock.language.as_deref(), Some("de"));
        let coords = config.location.coordinates().unwrap();
        assert_eq!((coords.latitude, coords.longitude), (52.52, 13.40));
    }

    #[test]
    fn test_ordinal_pattern_is_valid() {
        assert!(is_valid_date_format("%A, %B %-d%o"));
        assert!(is_valid_date_format("100%% on the %-d%o"));
        assert!(!is_valid_date_format("%o %Q"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_tz = ClockConfig::from_toml_str("[clock]\ntimezone = \"Mars/Olympus\"\n");
        assert!(matches!(bad_tz, Err(ConfigError::UnknownTimezone(_))));

        let bad_pattern = ClockConfig::from_toml_str("[clock]\ndate_format = \"%Q\"\n");
        assert!(matches!(bad_pattern, Err(ConfigError::InvalidDateFormat(_))));

        let lone_lat = ClockConfig::from_toml_str("[location]\nlatitude = 40.0\n");
        assert!(matches!(lone_lat, Err(ConfigError::IncompleteCoordinates)));

        let far_lat =
            ClockConfig::from_toml_str("[location]\nlatitude = 95.0\nlongitude = 10.0\n");
        assert!(matches!(far_lat, Err(ConfigError::LatitudeOutOfRange(_))));
    }

    #[test]
    fn test_nan_coordinates_are_not_usable() {
        let config =
            ClockConfig::from_toml_str("[location]\nlatitude = nan\nlongitude = 10.0\n").unwrap();
        assert!(config.location.coordinates().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[clock]
identifier = "hallway"
timeformat = 12
timezone = "America/New_York"

[display]
display_seconds = false
show_sun_times = true

[location]
latitude = 40.71
longitude = -74.0
"#
        )
        .unwrap();

        let config = ClockConfig::load_from_path(file.path());
        assert_eq!(config.clock.identifier, "hallway");
        assert!(config.uses_twelve_hour());
        assert_eq!(config.clock.timezone.as_deref(), Some("America/New_York"));
        assert!(!config.shows_seconds());
        assert!(config.display.show_sun_times);
        // Unset flags keep their defaults
        assert!(config.display.show_date);
        let coords = config.location.coordinates().unwrap();
        assert_eq!(coords.latitude, 40.71);
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[clock]\ntimezone = \"Not/AZone\"").unwrap();
        let config = ClockConfig::load_from_path(file.path());
        assert_eq!(config, ClockConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = ClockConfig::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config, ClockConfig::default());
    }

    #[test]
    fn test_seconds_require_time_row() {
        let mut config = ClockConfig::default();
        config.display.show_time = false;
        assert!(!config.shows_seconds());
    }
}
