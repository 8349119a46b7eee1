//! # Clock Text Formatting
//!
//! Turns a [`Moment`] into the strings the clock face shows. All formatting
//! goes through chrono's strftime support; the date row is localized with
//! chrono's locale tables and understands one extension, `%o`, the ordinal
//! suffix of the day of month ("2nd", "2.").

use crate::config::{is_valid_date_format, ClockConfig};
use crate::time_source::Moment;
use chrono::{Datelike, Locale};
use serde::Serialize;
use tracing::warn;

/// How a language writes day-of-month ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordinals {
    /// 1st, 2nd, 3rd, 4th
    English,
    /// 1., 2., 3.
    Period,
    /// No suffix
    Bare,
}

/// Locale used for the date row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateLocale {
    pub locale: Locale,
    pub ordinals: Ordinals,
}

impl Default for DateLocale {
    fn default() -> Self {
        DateLocale {
            locale: Locale::en_US,
            ordinals: Ordinals::English,
        }
    }
}

impl DateLocale {
    fn ordinal_suffix(&self, day: u32) -> &'static str {
        match self.ordinals {
            Ordinals::English => match (day % 10, day % 100) {
                (_, 11..=13) => "th",
                (1, _) => "st",
                (2, _) => "nd",
                (3, _) => "rd",
                _ => "th",
            },
            Ordinals::Period => ".",
            Ordinals::Bare => "",
        }
    }
}

fn ordinals_for(language: &str) -> Ordinals {
    match language {
        "en" => Ordinals::English,
        "de" | "da" | "nb" | "nn" | "fi" | "cs" | "sk" | "pl" | "et" | "hu" | "sl" | "hr" => {
            Ordinals::Period
        }
        _ => Ordinals::Bare,
    }
}

/// Resolve a configured language ("de", "pt-BR", "fr_FR") to a locale.
///
/// Bare language codes try `xx_XX` first ("de" is `de_DE`). Unknown values
/// log a warning and fall back to English.
pub fn resolve_locale(language: Option<&str>) -> DateLocale {
    let Some(raw) = language.map(str::trim).filter(|l| !l.is_empty()) else {
        return DateLocale::default();
    };
    let normalized = raw.replace('-', "_");
    let (code, region) = match normalized.split_once('_') {
        Some((code, region)) => (code.to_lowercase(), Some(region.to_uppercase())),
        None => (normalized.to_lowercase(), None),
    };

    let mut candidates = vec![normalized.clone()];
    match region {
        Some(region) => candidates.push(format!("{}_{}", code, region)),
        None => {
            candidates.push(format!("{}_{}", code, code.to_uppercase()));
            if code == "en" {
                candidates.push("en_US".to_string());
            }
        }
    }

    match candidates
        .iter()
        .find_map(|name| Locale::try_from(name.as_str()).ok())
    {
        Some(locale) => DateLocale {
            locale,
            ordinals: ordinals_for(&code),
        },
        None => {
            warn!("Unknown language '{}'; using English dates", raw);
            DateLocale::default()
        }
    }
}

/// Replace each `%o` in a date pattern with `suffix`. `%%` stays escaped.
pub fn expand_ordinal(pattern: &str, suffix: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('o') => out.push_str(suffix),
            Some(next) => {
                out.push('%');
                out.push(next);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Display strings for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TimeParts {
    pub hours: String,
    pub minutes: String,
    /// Empty unless seconds are displayed
    pub seconds: String,
    /// Empty unless a 12-hour clock shows its period
    pub period: String,
}

impl TimeParts {
    /// Dashes shown before the first moment is known.
    pub fn placeholder() -> Self {
        TimeParts {
            hours: "--".to_string(),
            minutes: "--".to_string(),
            seconds: String::new(),
            period: String::new(),
        }
    }
}

fn period_pattern(config: &ClockConfig) -> &'static str {
    if config.display.show_period_upper {
        "%p"
    } else {
        "%P"
    }
}

/// Split `now` into hour, minute, second and period strings.
///
/// 12-hour hours are un-padded ("9"), 24-hour hours are padded ("09").
pub fn format(now: &Moment, config: &ClockConfig) -> TimeParts {
    let dt = now.datetime();
    let use_12 = config.uses_twelve_hour();

    let hours = if use_12 {
        dt.format("%-I").to_string()
    } else {
        dt.format("%H").to_string()
    };
    let seconds = if config.shows_seconds() {
        dt.format("%S").to_string()
    } else {
        String::new()
    };
    let period = if use_12 && config.display.show_period {
        dt.format(period_pattern(config)).to_string()
    } else {
        String::new()
    };

    TimeParts {
        hours,
        minutes: dt.format("%M").to_string(),
        seconds,
        period,
    }
}

/// Short time for chips: "h:mm am" or "HH:mm". Missing events render as "--".
pub fn format_instant(moment: Option<&Moment>, config: &ClockConfig) -> String {
    let Some(moment) = moment else {
        return "--".to_string();
    };
    let dt = moment.datetime();
    if config.uses_twelve_hour() {
        format!(
            "{} {}",
            dt.format("%-I:%M"),
            dt.format(period_pattern(config))
        )
    } else {
        dt.format("%H:%M").to_string()
    }
}

/// Date row text using the configured pattern, in the given locale.
pub fn format_date(now: &Moment, config: &ClockConfig, locale: DateLocale) -> String {
    let pattern = &config.clock.date_format;
    if is_valid_date_format(pattern) {
        let suffix = locale.ordinal_suffix(now.date().day());
        let expanded = expand_ordinal(pattern, suffix);
        now.datetime()
            .format_localized(&expanded, locale.locale)
            .to_string()
    } else {
        now.date().format("%Y-%m-%d").to_string()
    }
}
