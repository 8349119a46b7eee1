//! # Tick Scheduling
//!
//! The clock is driven by a chain of one-shot timers rather than a fixed-rate
//! interval. Every tick recomputes the delay from the live clock so the next
//! tick lands just after the next second (or minute) boundary, and processing
//! jitter never accumulates.
//!
//! ```text
//!            start / resume / fire
//!   ┌──────┐ ───────────────────────▶ ┌───────────┐
//!   │ Idle │                          │ Scheduled │ ──┐ fire: rearm
//!   └──────┘ ◀─────────────────────── └───────────┘ ◀─┘
//!                   suspend
//! ```
//!
//! At most one tick is pending at any time. Arming always replaces the
//! previous tick, and each tick carries a generation number so that a timer
//! which fires after being replaced is recognised as stale and ignored.

use crate::time_source::Moment;
use std::time::Duration;
use tracing::trace;

/// Added to every delay so the timer never fires just before the boundary
/// and shows a stale digit.
pub const TICK_EPSILON_MS: u64 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
}

/// What the renderer has to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Rebuild the whole tree (first tick or new calendar day)
    Full,
    /// Patch the time text of the existing tree
    Incremental,
}

/// The single outstanding timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTick {
    pub generation: u64,
    pub delay: Duration,
}

/// Bookkeeping for the full-vs-incremental decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderState {
    pub last_rendered_day: Option<String>,
    pub has_rendered_once: bool,
}

/// Delay from `now` until just after the next second or minute boundary.
pub fn delay_until_next_tick(now: &Moment, show_seconds: bool) -> Duration {
    let millis = u64::from(now.millisecond());
    let ms = if show_seconds {
        1000 - millis + TICK_EPSILON_MS
    } else {
        let seconds = u64::from(now.second().min(59));
        (60 - seconds) * 1000 - millis + TICK_EPSILON_MS
    };
    Duration::from_millis(ms)
}

#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
    render_state: RenderState,
    pending: Option<PendingTick>,
    generation: u64,
    show_seconds: bool,
}

impl Scheduler {
    pub fn new(show_seconds: bool) -> Self {
        Self {
            state: SchedulerState::Idle,
            render_state: RenderState::default(),
            pending: None,
            generation: 0,
            show_seconds,
        }
    }

    /// Decide how to render `now`. A full render records the day it was made for.
    pub fn decide(&mut self, now: &Moment) -> RenderMode {
        let day_key = now.day_key();
        let needs_full = !self.render_state.has_rendered_once
            || self.render_state.last_rendered_day.as_deref() != Some(day_key.as_str());

        if needs_full {
            self.render_state.last_rendered_day = Some(day_key);
            self.render_state.has_rendered_once = true;
            RenderMode::Full
        } else {
            RenderMode::Incremental
        }
    }

    /// Replace any pending tick with a new one aligned to the next boundary.
    pub fn arm(&mut self, now: &Moment) -> PendingTick {
        if let Some(previous) = self.cancel() {
            trace!("Replacing pending tick #{}", previous.generation);
        }
        self.generation += 1;
        let tick = PendingTick {
            generation: self.generation,
            delay: delay_until_next_tick(now, self.show_seconds),
        };
        self.pending = Some(tick);
        self.state = SchedulerState::Scheduled;
        tick
    }

    /// Drop the pending tick, if any. Render state is kept.
    pub fn cancel(&mut self) -> Option<PendingTick> {
        self.state = SchedulerState::Idle;
        self.pending.take()
    }

    /// Consume the pending tick if `generation` is still current.
    ///
    /// Returns false for a stale or cancelled timer; the caller must not tick.
    pub fn fire(&mut self, generation: u64) -> bool {
        match self.pending {
            Some(tick) if tick.generation == generation => {
                self.pending = None;
                self.state = SchedulerState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending(&self) -> Option<PendingTick> {
        self.pending
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::parse_utc_datetime;
    use chrono::{Duration as ChronoDuration, FixedOffset};

    fn moment(s: &str) -> Moment {
        Moment::new(parse_utc_datetime(s).unwrap(), FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn test_first_tick_is_full_then_incremental() {
        let mut scheduler = Scheduler::new(true);
        let now = moment("2024-08-01 10:00:00");
        assert_eq!(scheduler.decide(&now), RenderMode::Full);
        assert_eq!(scheduler.decide(&now), RenderMode::Incremental);
        assert_eq!(
            scheduler.render_state().last_rendered_day.as_deref(),
            Some("2024-08-01")
        );
    }

    #[test]
    fn test_day_change_forces_full_render() {
        let mut scheduler = Scheduler::new(true);
        scheduler.decide(&moment("2024-08-01 23:59:59"));
        assert_eq!(
            scheduler.decide(&moment("2024-08-02 00:00:00")),
            RenderMode::Full
        );
        assert_eq!(
            scheduler.render_state().last_rendered_day.as_deref(),
            Some("2024-08-02")
        );
    }

    #[test]
    fn test_delay_with_seconds() {
        let base = parse_utc_datetime("2024-08-01 10:00:00").unwrap();
        let offset = FixedOffset::east_opt(0).unwrap();
        for ms in [0, 1, 250, 500, 999] {
            let now = Moment::new(base + ChronoDuration::milliseconds(ms), offset);
            let delay = delay_until_next_tick(&now, true);
            assert!(delay > Duration::ZERO);
            assert!(delay <= Duration::from_millis(1025));
            assert_eq!(delay.as_millis() as i64, 1000 - ms + 25);
        }
    }

    #[test]
    fn test_delay_without_seconds() {
        let base = parse_utc_datetime("2024-08-01 10:00:00").unwrap();
        let offset = FixedOffset::east_opt(0).unwrap();
        for ms in [0, 999, 30_000, 59_999] {
            let now = Moment::new(base + ChronoDuration::milliseconds(ms), offset);
            let delay = delay_until_next_tick(&now, false);
            assert!(delay > Duration::ZERO);
            assert!(delay <= Duration::from_millis(60_025));
            assert_eq!(delay.as_millis() as i64, 60_000 - ms + 25);
        }
    }

    #[test]
    fn test_arm_replaces_pending_tick() {
        let mut scheduler = Scheduler::new(true);
        let now = moment("2024-08-01 10:00:00");
        let first = scheduler.arm(&now);
        let second = scheduler.arm(&now);
        assert_ne!(first.generation, second.generation);
        assert_eq!(scheduler.pending(), Some(second));
        // The replaced timer firing late is ignored
        assert!(!scheduler.fire(first.generation));
        assert!(scheduler.fire(second.generation));
        assert_eq!(scheduler.pending(), None);
    }

    #[test]
    fn test_suspend_resume_leaves_one_pending_tick() {
        let mut scheduler = Scheduler::new(false);
        let now = moment("2024-08-01 10:00:00");
        scheduler.decide(&now);
        let before = scheduler.arm(&now);

        assert_eq!(scheduler.cancel(), Some(before));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.pending(), None);

        let after = scheduler.arm(&now);
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert_eq!(scheduler.pending(), Some(after));
        assert!(!scheduler.fire(before.generation));
        // Render state survives the pause
        assert!(scheduler.render_state().has_rendered_once);
    }
}
