//! # Widget Lifecycle Tests
//!
//! These tests drive a [`GlassClock`] tick by tick with a manual clock and a
//! scripted astronomy provider, checking what a user would see: which renders
//! are full, what the chips say, and that exactly one timer is ever pending.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use glass_clock_lib::astronomy::{
    AstronomyError, AstronomyProvider, MoonTimes, SunTimes,
};
use glass_clock_lib::config::{Coordinates, TimeFormat};
use glass_clock_lib::renderer::{
    time_line, Node, StaticIcons, MOON_BELOW_HORIZON, MOON_UP_ALL_DAY, SET_COORDINATES,
};
use glass_clock_lib::scheduler::{RenderMode, SchedulerState};
use glass_clock_lib::time_source::{parse_utc_datetime, ManualClock, TimeSource};
use glass_clock_lib::{ClockConfig, GlassClock, Widget};
use std::cell::Cell;
use std::rc::Rc;

/// Sun at 06:00/18:00 UTC every day, moon as scripted.
struct ScriptedSky {
    moon: MoonTimes,
    calls: Rc<Cell<u32>>,
}

impl AstronomyProvider for ScriptedSky {
    fn sun_times(&self, date: NaiveDate, _at: Coordinates) -> Result<SunTimes, AstronomyError> {
        self.calls.set(self.calls.get() + 1);
        Ok(SunTimes {
            sunrise: date.and_hms_opt(6, 0, 0).map(|t| t.and_utc()),
            sunset: date.and_hms_opt(18, 0, 0).map(|t| t.and_utc()),
        })
    }

    fn moon_times(
        &self,
        _day_start: DateTime<Utc>,
        _at: Coordinates,
    ) -> Result<MoonTimes, AstronomyError> {
        Ok(self.moon)
    }
}

struct Fixture {
    widget: GlassClock,
    clock: ManualClock,
    sky_calls: Rc<Cell<u32>>,
}

fn fixture(config: ClockConfig, start: &str, moon: MoonTimes) -> Fixture {
    let clock = ManualClock::new(parse_utc_datetime(start).unwrap());
    let sky_calls = Rc::new(Cell::new(0));
    let time_source = TimeSource::new(config.clock.timezone.as_deref(), Box::new(clock.clone()));
    let sky = ScriptedSky {
        moon,
        calls: sky_calls.clone(),
    };
    let widget = GlassClock::with_parts(
        config,
        time_source,
        Box::new(sky),
        Box::new(StaticIcons::default()),
    );
    Fixture {
        widget,
        clock,
        sky_calls,
    }
}

fn chip_config() -> ClockConfig {
    let mut config = ClockConfig::default();
    config.clock.timezone = Some("UTC".to_string());
    config.display.show_sun_times = true;
    config.display.show_moon_times = true;
    config.location.latitude = Some(51.5);
    config.location.longitude = Some(-0.12);
    config
}

fn chip_values(tree: &Node) -> Vec<String> {
    let mut values = Vec::new();
    tree.find_all_by_class("glass-chip-value", &mut values);
    values.into_iter().map(|n| n.text.clone()).collect()
}

fn time_text(widget: &GlassClock) -> String {
    widget
        .render()
        .and_then(|tree| tree.find_by_class("glass-clock-time"))
        .map(time_line)
        .unwrap_or_default()
}

/// The day key reported for a tick is the local calendar date of that tick.
#[test]
fn day_key_matches_local_date() {
    let mut config = ClockConfig::default();
    config.clock.timezone = Some("Asia/Tokyo".to_string());
    let mut f = fixture(config, "2024-12-31 16:30:00", MoonTimes::default());

    let report = f.widget.initialize();
    // 01:30 on New Year's Day in Tokyo
    assert_eq!(report.day_key, "2025-01-01");
    assert_eq!(
        report.day_key,
        f.widget.now().unwrap().date().format("%Y-%m-%d").to_string()
    );
}

/// First tick renders fully, later same-day ticks only patch the time text.
#[test]
fn first_tick_full_then_incremental() {
    let mut f = fixture(chip_config(), "2024-03-01 09:00:00", MoonTimes::default());

    let first = f.widget.initialize();
    assert_eq!(first.mode, RenderMode::Full);
    assert_eq!(time_text(&f.widget), "09:00:00");

    f.clock.advance(Duration::milliseconds(1025));
    let second = f.widget.on_timer(first.next.generation).unwrap();
    assert_eq!(second.mode, RenderMode::Incremental);
    assert_eq!(time_text(&f.widget), "09:00:01");

    // Chips are untouched by incremental updates
    let tree = f.widget.render().unwrap();
    assert_eq!(chip_values(tree)[..2], ["06:00", "18:00"]);
}

/// Crossing midnight triggers a full render and fresh astronomy.
#[test]
fn midnight_rollover_renders_full_and_recomputes() {
    let mut f = fixture(chip_config(), "2024-03-01 23:59:59", MoonTimes::default());

    let first = f.widget.initialize();
    assert_eq!(f.sky_calls.get(), 1);

    f.clock.advance(Duration::seconds(1));
    let next = f.widget.on_timer(first.next.generation).unwrap();
    assert_eq!(next.mode, RenderMode::Full);
    assert_eq!(next.day_key, "2024-03-02");
    assert_eq!(f.sky_calls.get(), 2);
    assert_eq!(f.widget.renderer().player_count(), 4);
}

/// A whole day of ticks computes astronomy once.
#[test]
fn astronomy_is_computed_once_per_day() {
    let mut f = fixture(chip_config(), "2024-03-01 00:00:00", MoonTimes::default());
    let mut report = f.widget.initialize();

    for _ in 0..500 {
        f.clock.advance(Duration::seconds(97));
        report = match f.widget.on_timer(report.next.generation) {
            Some(report) => report,
            None => panic!("current generation must tick"),
        };
    }
    assert_eq!(report.day_key, "2024-03-01");
    assert_eq!(f.sky_calls.get(), 1);
    assert_eq!(f.widget.astronomy().computations(), 1);
}

/// Suspend leaves nothing pending; resume arms exactly one tick.
#[test]
fn suspend_resume_leaves_one_pending_tick() {
    let mut f = fixture(ClockConfig::default(), "2024-03-01 12:00:00", MoonTimes::default());
    let first = f.widget.initialize();
    assert_eq!(f.widget.pending(), Some(first.next));

    f.widget.suspend();
    assert_eq!(f.widget.pending(), None);
    assert_eq!(f.widget.scheduler().state(), SchedulerState::Idle);

    // The timer that was in flight when we suspended must not tick
    assert!(f.widget.on_timer(first.next.generation).is_none());

    f.clock.advance(Duration::minutes(10));
    let resumed = f.widget.resume();
    assert_eq!(resumed.mode, RenderMode::Incremental);
    assert_eq!(f.widget.pending(), Some(resumed.next));
    assert_eq!(time_text(&f.widget), "12:10:00");

    // Resuming twice still leaves a single, newer tick
    let again = f.widget.resume();
    assert_eq!(f.widget.pending(), Some(again.next));
    assert!(f.widget.on_timer(resumed.next.generation).is_none());
}

/// Without seconds the clock ticks on minute boundaries.
#[test]
fn minute_ticks_without_seconds() {
    let mut config = ClockConfig::default();
    config.display.display_seconds = false;
    let mut f = fixture(config, "2024-03-01 12:00:42", MoonTimes::default());

    let report = f.widget.initialize();
    assert_eq!(report.next.delay.as_millis(), 18_025);
    assert_eq!(time_text(&f.widget), "12:00");
}

/// Sun chips show localized times; always-up moon wins over timestamps.
#[test]
fn chips_show_localized_times_and_moon_flags() {
    let mut config = chip_config();
    config.clock.timezone = Some("Europe/Berlin".to_string());
    config.clock.timeformat = TimeFormat::Twelve;
    let moon = MoonTimes {
        rise: parse_utc_datetime("2024-07-01 20:00:00").ok(),
        set: None,
        always_up: true,
        always_down: false,
    };
    let mut f = fixture(config, "2024-07-01 10:00:00", moon);
    f.widget.initialize();

    let tree = f.widget.render().unwrap();
    // CEST is UTC+2
    assert_eq!(chip_values(tree), ["8:00 am", "8:00 pm", MOON_UP_ALL_DAY]);
    assert_eq!(f.widget.renderer().player_count(), 2);
}

/// Moon below the horizon all day shows the flag, not dashes.
#[test]
fn moon_always_down_chip() {
    let moon = MoonTimes {
        always_down: true,
        ..MoonTimes::default()
    };
    let mut config = chip_config();
    config.display.show_sun_times = false;
    let mut f = fixture(config, "2024-01-10 12:00:00", moon);
    f.widget.initialize();
    assert_eq!(chip_values(f.widget.render().unwrap()), [MOON_BELOW_HORIZON]);
}

/// Missing moon events render as dashes.
#[test]
fn missing_moon_events_render_dashes() {
    let moon = MoonTimes {
        rise: parse_utc_datetime("2024-01-10 14:05:00").ok(),
        ..MoonTimes::default()
    };
    let mut config = chip_config();
    config.display.show_sun_times = false;
    let mut f = fixture(config, "2024-01-10 12:00:00", moon);
    f.widget.initialize();
    assert_eq!(chip_values(f.widget.render().unwrap()), ["14:05", "--"]);
}

/// No coordinates: both rows show the muted "set coordinates" chip.
#[test]
fn missing_coordinates_show_placeholder() {
    let mut config = chip_config();
    config.location.latitude = None;
    config.location.longitude = None;
    let mut f = fixture(config, "2024-01-10 12:00:00", MoonTimes::default());
    f.widget.initialize();

    let tree = f.widget.render().unwrap();
    assert_eq!(chip_values(tree), [SET_COORDINATES, SET_COORDINATES]);
    assert_eq!(f.sky_calls.get(), 0);
    assert_eq!(f.widget.renderer().player_count(), 0);
}

/// The date row follows the configured language.
#[test]
fn date_row_uses_configured_language() {
    let date_text = |language: Option<&str>| {
        let mut config = ClockConfig::default();
        config.clock.timezone = Some("Europe/Berlin".to_string());
        config.clock.language = language.map(str::to_string);
        let mut f = fixture(config, "2024-02-02 09:00:00", MoonTimes::default());
        f.widget.initialize();
        f.widget
            .render()
            .and_then(|tree| tree.find_by_class("glass-clock-date"))
            .map(|node| node.text.clone())
            .unwrap_or_default()
    };
    assert_eq!(date_text(None), "Friday, February 2nd");
    assert_eq!(date_text(Some("de")), "Freitag, Februar 2.");
    // Unknown language: English
    assert_eq!(date_text(Some("zz-ZZ")), "Friday, February 2nd");
}

/// Hiding the time row keeps the widget ticking without a time to patch.
#[test]
fn hidden_time_row_still_ticks() {
    let mut config = ClockConfig::default();
    config.display.show_time = false;
    let mut f = fixture(config, "2024-01-10 12:00:30", MoonTimes::default());

    let report = f.widget.initialize();
    assert!(f
        .widget
        .render()
        .unwrap()
        .find_by_class("glass-clock-time")
        .is_none());
    // Seconds are implied off with the time row hidden, so the next tick is
    // on the minute even though display_seconds is still true
    assert!(f.widget.config().display.display_seconds);
    assert_eq!(report.next.delay.as_millis(), 30_025);

    f.clock.advance(Duration::seconds(30));
    assert!(f.widget.on_timer(report.next.generation).is_some());
}

/// Shutdown cancels the timer and releases every animation player.
#[test]
fn shutdown_releases_resources() {
    let mut f = fixture(chip_config(), "2024-01-10 12:00:00", MoonTimes::default());
    let report = f.widget.initialize();
    assert!(f.widget.renderer().player_count() > 0);

    f.widget.shutdown();
    assert_eq!(f.widget.pending(), None);
    assert_eq!(f.widget.renderer().player_count(), 0);
    assert!(f.widget.on_timer(report.next.generation).is_none());
}

/// Before the first tick the widget shows placeholder dashes.
#[test]
fn placeholder_before_first_tick() {
    let f = fixture(ClockConfig::default(), "2024-01-10 12:00:00", MoonTimes::default());
    assert!(f.widget.render().is_none());
    assert_eq!(f.widget.time_parts().hours, "--");
}
