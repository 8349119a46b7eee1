//! Low-precision lunar position and rise/set search
//!
//! Moon coordinates follow the simplified series from Meeus, "Astronomical
//! Algorithms" ch. 47 (three leading terms), which is plenty for minute-level
//! rise/set times on a clock face. Accuracy: a couple of minutes for rise and
//! set away from the poles.
//!
//! Rise and set are found by sampling the altitude every hour across the local
//! day and fitting a parabola through each pair of two-hour windows.

use chrono::{DateTime, Duration, Utc};
use core::f64::consts::PI;

const RAD: f64 = PI / 180.0;
const MS_PER_DAY: f64 = 86_400_000.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
/// Obliquity of the ecliptic at J2000
const OBLIQUITY: f64 = RAD * 23.4397;
/// Altitude of the Moon's center at rise/set, relative to the geometric horizon
const HORIZON_CORRECTION: f64 = 0.133 * RAD;

/// Moon events for one local calendar day.
///
/// When neither a rise nor a set happens, exactly one of `always_up` /
/// `always_down` is true and both instants are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoonTimes {
    pub rise: Option<DateTime<Utc>>,
    pub set: Option<DateTime<Utc>>,
    pub always_up: bool,
    pub always_down: bool,
}

/// Geocentric equatorial coordinates of the Moon.
#[derive(Debug, Clone, Copy)]
pub struct MoonCoords {
    /// Right ascension (rad)
    pub right_ascension: f64,
    /// Declination (rad)
    pub declination: f64,
    /// Distance to Earth's center (km)
    pub distance_km: f64,
}

/// Days since J2000.0 for an instant.
fn to_days(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / MS_PER_DAY - 0.5 + J1970 - J2000
}

fn right_ascension(l: f64, b: f64) -> f64 {
    (l.sin() * OBLIQUITY.cos() - b.tan() * OBLIQUITY.sin()).atan2(l.cos())
}

fn declination(l: f64, b: f64) -> f64 {
    (b.sin() * OBLIQUITY.cos() + b.cos() * OBLIQUITY.sin() * l.sin()).asin()
}

fn altitude(hour_angle: f64, phi: f64, dec: f64) -> f64 {
    (phi.sin() * dec.sin() + phi.cos() * dec.cos() * hour_angle.cos()).asin()
}

fn sidereal_time(d: f64, lw: f64) -> f64 {
    RAD * (280.16 + 360.985_623_5 * d) - lw
}

/// Atmospheric refraction for an apparent altitude (rad), Saemundsson's formula.
fn astro_refraction(h: f64) -> f64 {
    // Formula misbehaves below the horizon; clamp at zero
    let h = h.max(0.0);
    0.000_296_7 / (h + 0.003_125_36 / (h + 0.089_011_79)).tan()
}

/// Moon's position `d` days after J2000.0.
pub fn moon_coords(d: f64) -> MoonCoords {
    let mean_longitude = RAD * (218.316 + 13.176_396 * d);
    let mean_anomaly = RAD * (134.963 + 13.064_993 * d);
    let arg_latitude = RAD * (93.272 + 13.229_350 * d);

    let l = mean_longitude + RAD * 6.289 * mean_anomaly.sin();
    let b = RAD * 5.128 * arg_latitude.sin();
    let distance_km = 385_001.0 - 20_905.0 * mean_anomaly.cos();

    MoonCoords {
        right_ascension: right_ascension(l, b),
        declination: declination(l, b),
        distance_km,
    }
}

/// Apparent altitude (rad) of the Moon above the horizon, refraction included.
pub fn moon_altitude(at: DateTime<Utc>, latitude: f64, longitude: f64) -> f64 {
    let lw = RAD * -longitude;
    let phi = RAD * latitude;
    let d = to_days(at);

    let coords = moon_coords(d);
    let hour_angle = sidereal_time(d, lw) - coords.right_ascension;
    let h = altitude(hour_angle, phi, coords.declination);
    h + astro_refraction(h)
}

fn hours_later(start: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    start + Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Moonrise and moonset during the 24 hours following `day_start`.
///
/// `day_start` should be local midnight of the day of interest.
pub fn moon_times(day_start: DateTime<Utc>, latitude: f64, longitude: f64) -> MoonTimes {
    let alt = |hours: f64| {
        moon_altitude(hours_later(day_start, hours), latitude, longitude) - HORIZON_CORRECTION
    };

    let mut h0 = alt(0.0);
    let mut rise: Option<f64> = None;
    let mut set: Option<f64> = None;
    let mut ye = 0.0;

    // Two-hour windows: samples at i-1, i, i+1
    for i in (1..=23).step_by(2) {
        let i = i as f64;
        let h1 = alt(i);
        let h2 = alt(i + 1.0);

        let a = (h0 + h2) / 2.0 - h1;
        let b = (h2 - h0) / 2.0;
        let xe = -b / (2.0 * a);
        ye = (a * xe + b) * xe + h1;
        let discriminant = b * b - 4.0 * a * h1;
        let mut roots = 0;
        let mut x1 = 0.0;
        let mut x2 = 0.0;

        if discriminant >= 0.0 {
            let dx = discriminant.sqrt() / (a.abs() * 2.0);
            x1 = xe - dx;
            x2 = xe + dx;
            if x1.abs() <= 1.0 {
                roots += 1;
            }
            if x2.abs() <= 1.0 {
                roots += 1;
            }
            if x1 < -1.0 {
                x1 = x2;
            }
        }

        match roots {
            1 => {
                if h0 < 0.0 {
                    rise = Some(i + x1);
                } else {
                    set = Some(i + x1);
                }
            }
            2 => {
                let (up, down) = if ye < 0.0 { (x2, x1) } else { (x1, x2) };
                rise = Some(i + up);
                set = Some(i + down);
            }
            _ => {}
        }

        if rise.is_some() && set.is_some() {
            break;
        }
        h0 = h2;
    }

    let mut times = MoonTimes {
        rise: rise.map(|h| hours_later(day_start, h)),
        set: set.map(|h| hours_later(day_start, h)),
        ..MoonTimes::default()
    };
    if rise.is_none() && set.is_none() {
        if ye > 0.0 {
            times.always_up = true;
        } else {
            times.always_down = true;
        }
    }
    times
}
