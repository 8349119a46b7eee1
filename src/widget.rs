//! # Clock Widget
//!
//! [`GlassClock`] ties the pieces together: each tick reads the time, refreshes
//! the astronomy cache, formats the clock text, then either rebuilds or patches
//! the visual tree and arms the next tick.
//!
//! Hosts drive widgets through the [`Widget`] lifecycle trait and never reach
//! into their internals.

use crate::astronomy::{AstroSnapshot, AstronomyCache, AstronomyProvider, SkyCalculator};
use crate::config::ClockConfig;
use crate::formatter::{self, DateLocale, TimeParts};
use crate::renderer::{
    AnimationProvider, ClockView, MoonRow, Node, Renderer, StaticIcons, SunRow,
};
use crate::scheduler::{PendingTick, RenderMode, Scheduler, SchedulerState};
use crate::time_source::{Moment, TimeSource, ZonedClock};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub mode: RenderMode,
    /// Day key of the tick's "now"
    pub day_key: String,
    pub next: PendingTick,
}

/// Lifecycle hooks a host calls on a widget.
pub trait Widget {
    /// First tick: full render and arm the timer.
    fn initialize(&mut self) -> TickReport;

    /// A timer armed by this widget fired. Stale generations are ignored.
    fn on_timer(&mut self, generation: u64) -> Option<TickReport>;

    /// Stop ticking. Nothing is lost; no catch-up happens on resume.
    fn suspend(&mut self);

    /// Tick immediately from the current time and re-arm.
    fn resume(&mut self) -> TickReport;

    /// Current visual tree, `None` before the first render.
    fn render(&self) -> Option<&Node>;

    /// The single outstanding timer, if any.
    fn pending(&self) -> Option<PendingTick>;

    /// Transition length hosts should use for full renders.
    fn transition(&self) -> Duration {
        Duration::ZERO
    }

    /// Release resources before the host drops the widget.
    fn shutdown(&mut self) {}
}

pub struct GlassClock {
    config: ClockConfig,
    time_source: TimeSource,
    astronomy: AstronomyCache,
    scheduler: Scheduler,
    renderer: Renderer,
    locale: DateLocale,
    now: Option<Moment>,
}

impl GlassClock {
    /// Widget with the default providers: zoned system clock, built-in
    /// sun/moon calculator and static icons.
    pub fn new(config: ClockConfig) -> Self {
        let time_source = TimeSource::new(config.clock.timezone.as_deref(), Box::new(ZonedClock));
        Self::with_parts(
            config,
            time_source,
            Box::new(SkyCalculator),
            Box::new(StaticIcons::default()),
        )
    }

    pub fn with_parts(
        config: ClockConfig,
        time_source: TimeSource,
        astronomy: Box<dyn AstronomyProvider>,
        animations: Box<dyn AnimationProvider>,
    ) -> Self {
        let scheduler = Scheduler::new(config.shows_seconds());
        let renderer = Renderer::new(&config.clock.identifier, animations);
        let locale = formatter::resolve_locale(config.clock.language.as_deref());
        Self {
            config,
            time_source,
            astronomy: AstronomyCache::new(astronomy),
            scheduler,
            renderer,
            locale,
            now: None,
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// The moment observed by the last tick.
    pub fn now(&self) -> Option<&Moment> {
        self.now.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn astronomy(&self) -> &AstronomyCache {
        &self.astronomy
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Current time text, dashes before the first tick.
    pub fn time_parts(&self) -> TimeParts {
        match &self.now {
            Some(now) => formatter::format(now, &self.config),
            None => TimeParts::placeholder(),
        }
    }

    /// One full tick: observe, compute, render, re-arm.
    pub fn tick(&mut self) -> TickReport {
        let now = self.time_source.now();
        self.now = Some(now);

        let parts = formatter::format(&now, &self.config);
        let snapshot = self
            .astronomy
            .update(&now, self.config.location.coordinates());

        let mode = self.scheduler.decide(&now);
        match mode {
            RenderMode::Full => {
                let view = self.view(&now, parts, snapshot);
                self.renderer.render(&view);
                debug!("Full render for {}", now.day_key());
            }
            RenderMode::Incremental => {
                self.renderer.patch_time(&parts);
            }
        }

        let next = self.scheduler.arm(&now);
        TickReport {
            mode,
            day_key: now.day_key(),
            next,
        }
    }

    fn view(&mut self, now: &Moment, parts: TimeParts, snapshot: AstroSnapshot) -> ClockView {
        let display = self.config.display.clone();
        let has_coordinates = self.config.location.coordinates().is_some();

        let sun = display.show_sun_times.then(|| match snapshot.sun {
            Some(sun) if has_coordinates => SunRow::Times {
                sunrise: self.chip_time(sun.sunrise),
                sunset: self.chip_time(sun.sunset),
            },
            _ => SunRow::Unavailable,
        });

        let moon = display.show_moon_times.then(|| match snapshot.moon {
            Some(moon) if moon.always_up => MoonRow::AlwaysUp,
            Some(moon) if moon.always_down => MoonRow::AlwaysDown,
            Some(moon) if has_coordinates => MoonRow::Times {
                rise: self.chip_time(moon.rise),
                set: self.chip_time(moon.set),
            },
            _ => MoonRow::Unavailable,
        });

        ClockView {
            parts,
            show_time: display.show_time,
            date: display
                .show_date
                .then(|| formatter::format_date(now, &self.config, self.locale)),
            sun,
            moon,
        }
    }

    fn chip_time(&mut self, instant: Option<DateTime<Utc>>) -> String {
        let moment = instant.map(|utc| self.time_source.localize(utc));
        formatter::format_instant(moment.as_ref(), &self.config)
    }
}

impl Widget for GlassClock {
    fn initialize(&mut self) -> TickReport {
        info!("Starting widget: {}", self.renderer.root_id());
        self.tick()
    }

    fn on_timer(&mut self, generation: u64) -> Option<TickReport> {
        if !self.scheduler.fire(generation) {
            debug!("Ignoring stale tick #{}", generation);
            return None;
        }
        Some(self.tick())
    }

    fn suspend(&mut self) {
        if self.scheduler.cancel().is_some() {
            info!("Suspended {}", self.renderer.root_id());
        }
    }

    fn resume(&mut self) -> TickReport {
        if self.scheduler.state() == SchedulerState::Idle {
            info!("Resuming {}", self.renderer.root_id());
        }
        self.tick()
    }

    fn render(&self) -> Option<&Node> {
        self.renderer.tree()
    }

    fn pending(&self) -> Option<PendingTick> {
        self.scheduler.pending()
    }

    fn transition(&self) -> Duration {
        Duration::from_millis(self.config.clock.animation_speed)
    }

    fn shutdown(&mut self) {
        self.scheduler.cancel();
        self.renderer.release_players();
    }
}
