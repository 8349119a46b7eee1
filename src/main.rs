//! # Glass Clock Application Entry Point
//!
//! This binary loads the clock configuration, builds the widget and runs it on a
//! single-threaded tokio runtime, printing frames to stdout. Logs go to stderr so
//! they never interleave with the clock face.
//!
//! ```text
//! glass-clock [--config <path>] [--stdout | --json | --bitmap] [--once] [--at "YYYY-MM-DD HH:MM:SS"]
//! ```

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use std::env;
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

use glass_clock_lib::host::{
    present_once, AsciiSink, BitmapSink, FrameSink, HostHandle, JsonSink,
};
use glass_clock_lib::time_source::{parse_utc_datetime, ManualClock, TimeSource};
use glass_clock_lib::{ClockConfig, GlassClock, Host, Widget};

/// Bitmap preview size, matching a small 250x122 e-paper panel
const BITMAP_WIDTH: u32 = 250;
const BITMAP_HEIGHT: u32 = 122;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Ascii,
    Json,
    Bitmap,
}

#[derive(Debug)]
struct Options {
    config_path: Option<String>,
    output: Output,
    once: bool,
    at: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options {
        config_path: None,
        output: Output::Ascii,
        once: false,
        at: None,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                options.config_path = Some(args.next().context("--config needs a path")?);
            }
            "--at" => {
                options.at = Some(args.next().context("--at needs a datetime")?);
            }
            "--stdout" => options.output = Output::Ascii,
            "--json" => options.output = Output::Json,
            "--bitmap" => options.output = Output::Bitmap,
            "--once" => options.once = true,
            other => anyhow::bail!("unknown argument '{}'", other),
        }
    }
    Ok(options)
}

fn build_widget(config: ClockConfig, at: Option<&str>) -> anyhow::Result<GlassClock> {
    let Some(at) = at else {
        return Ok(GlassClock::new(config));
    };

    let instant = parse_utc_datetime(at)?;
    info!("Clock frozen at {} UTC", instant);
    let time_source = TimeSource::new(
        config.clock.timezone.as_deref(),
        Box::new(ManualClock::new(instant)),
    );
    Ok(GlassClock::with_parts(
        config,
        time_source,
        Box::new(glass_clock_lib::astronomy::SkyCalculator),
        Box::new(glass_clock_lib::renderer::StaticIcons::default()),
    ))
}

/// Forward Ctrl-C, and on unix SIGUSR1/SIGUSR2, to the host.
fn forward_signals(handle: HostHandle) {
    let on_ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            on_ctrl_c.shutdown();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::user_defined1()),
            signal(SignalKind::user_defined2()),
        ) {
            (Ok(mut suspend), Ok(mut resume)) => {
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            Some(()) = suspend.recv() => {
                                if !handle.suspend() { break; }
                            }
                            Some(()) = resume.recv() => {
                                if !handle.resume() { break; }
                            }
                            else => break,
                        }
                    }
                });
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Suspend/resume signals unavailable: {}", e);
            }
        }
    }
    #[cfg(not(unix))]
    drop(handle);
}

async fn run_host<S: FrameSink>(widget: GlassClock, sink: S) -> anyhow::Result<()> {
    let (host, handle) = Host::new(widget, sink);
    forward_signals(handle);
    host.run().await?;
    Ok(())
}

fn render_once<S: FrameSink>(mut widget: GlassClock, mut sink: S) -> anyhow::Result<()> {
    let report = widget.initialize();
    present_once(&widget, &mut sink, report.mode)?;
    widget.shutdown();
    Ok(())
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    // Logs on stderr, filtered by RUST_LOG (default: info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let options = parse_args(env::args().skip(1))?;

    let config = match &options.config_path {
        Some(path) => ClockConfig::load_from_path(path),
        None => ClockConfig::load(),
    };
    let widget = build_widget(config, options.at.as_deref())?;

    if options.once {
        return match options.output {
            Output::Ascii => render_once(widget, AsciiSink::new(io::stdout())),
            Output::Json => render_once(widget, JsonSink::new(io::stdout())),
            Output::Bitmap => render_once(
                widget,
                BitmapSink::new(io::stdout(), BITMAP_WIDTH, BITMAP_HEIGHT),
            ),
        };
    }

    // The widget is not Send, so everything runs on the current thread
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        match options.output {
            Output::Ascii => run_host(widget, AsciiSink::new(io::stdout())).await,
            Output::Json => run_host(widget, JsonSink::new(io::stdout())).await,
            Output::Bitmap => {
                run_host(
                    widget,
                    BitmapSink::new(io::stdout(), BITMAP_WIDTH, BITMAP_HEIGHT),
                )
                .await
            }
        }
    })
}
