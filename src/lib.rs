//! # Glass Clock Core Library
//!
//! This library provides the clock widget behind the `glass-clock` binary: a
//! digital clock with an optional date row and sunrise/sunset and
//! moonrise/moonset chips, rendered to a small visual tree that text, JSON and
//! 1-bit bitmap surfaces can display.
//!
//! ## Design Philosophy
//!
//! ### Cheap Ticks
//! The clock ticks every second (or every minute when seconds are hidden), but
//! most ticks only change a few characters:
//! - **Incremental updates**: Same-day ticks rewrite the time text in place and
//!   leave the chips and their icon animations alone
//! - **Full renders**: Only the first tick and the first tick of a new calendar
//!   day rebuild the tree
//! - **Per-day astronomy**: Sun and moon events are computed once per day key
//!   and coordinate pair, then served from cache
//!
//! ### Drift-Free Scheduling
//! Ticks are one-shot timers re-armed from the live clock, landing 25 ms after
//! each second or minute boundary. See [`scheduler`].
//!
//! ### Graceful Degradation
//! - Unknown timezone or a clock without timezone support: local time, one warning
//! - Failing clock: the system clock takes over, one error
//! - Missing coordinates: chips show "Set latitude/longitude"
//! - Failing astronomy: chips are cleared until the next day
//!
//! ### Data Flow
//! 1. [`time_source`] resolves "now" in the configured zone
//! 2. [`astronomy`] refreshes sun/moon events for the day ([`lunar`] for the moon)
//! 3. [`formatter`] produces the clock strings
//! 4. [`renderer`] builds or patches the tree
//! 5. [`host`] presents it and sleeps until the tick [`scheduler`] armed
//!
//! ## Core Types
//! - [`GlassClock`]: The widget, driven through the [`Widget`] lifecycle trait
//! - [`ClockConfig`]: Settings loaded from `glass-clock.toml`
//! - [`Host`]: Async driver that owns a widget and a frame sink

// Module declarations
pub mod astronomy;
pub mod config;
pub mod eink_renderer;
pub mod formatter;
pub mod host;
pub mod lunar;
pub mod renderer;
pub mod scheduler;
pub mod time_source;
pub mod widget;

pub use config::ClockConfig;
pub use host::{Host, HostCommand, HostHandle};
pub use widget::{GlassClock, TickReport, Widget};
