//! # Widget Host
//!
//! Runs a [`Widget`] on a tokio runtime: sleeps until the widget's pending
//! tick is due, hands each rendered frame to a [`FrameSink`], and listens for
//! lifecycle commands (suspend, resume, shutdown) from a [`HostHandle`].
//!
//! The host keeps at most one timer. A tick fired after the widget re-armed
//! carries an old generation number and is dropped by the widget.

use crate::eink_renderer::{draw_eink, MonoFrame};
use crate::renderer::{ascii_lines, Node};
use crate::scheduler::{PendingTick, RenderMode};
use crate::widget::{TickReport, Widget};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

/// How far ahead an idle host parks its disabled timer branch.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to write frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lifecycle commands delivered to a running host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Suspend,
    Resume,
    Shutdown,
}

/// Sending half of the command channel.
#[derive(Debug, Clone)]
pub struct HostHandle {
    commands: mpsc::UnboundedSender<HostCommand>,
}

impl HostHandle {
    /// Returns false once the host has stopped.
    pub fn send(&self, command: HostCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn suspend(&self) -> bool {
        self.send(HostCommand::Suspend)
    }

    pub fn resume(&self) -> bool {
        self.send(HostCommand::Resume)
    }

    pub fn shutdown(&self) -> bool {
        self.send(HostCommand::Shutdown)
    }
}

/// One rendered frame as handed to a sink.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub tree: &'a Node,
    pub mode: RenderMode,
    /// Fade length for full renders, zero for incremental updates
    pub transition: Duration,
}

/// Output surface for rendered frames.
pub trait FrameSink {
    fn present(&mut self, frame: Frame<'_>) -> Result<(), SinkError>;
}

/// Prints the boxed text card.
pub struct AsciiSink<W: Write> {
    out: W,
}

impl<W: Write> AsciiSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for AsciiSink<W> {
    fn present(&mut self, frame: Frame<'_>) -> Result<(), SinkError> {
        for line in ascii_lines(frame.tree) {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonFrame<'a> {
    mode: &'static str,
    transition_ms: u64,
    tree: &'a Node,
}

/// Writes one JSON document per frame, newline delimited.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for JsonSink<W> {
    fn present(&mut self, frame: Frame<'_>) -> Result<(), SinkError> {
        let doc = JsonFrame {
            mode: match frame.mode {
                RenderMode::Full => "full",
                RenderMode::Incremental => "incremental",
            },
            transition_ms: u64::try_from(frame.transition.as_millis()).unwrap_or(u64::MAX),
            tree: frame.tree,
        };
        serde_json::to_writer(&mut self.out, &doc)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Rasterizes frames onto a 1-bit framebuffer and prints a half-block preview.
pub struct BitmapSink<W: Write> {
    out: W,
    width: u32,
    height: u32,
}

impl<W: Write> BitmapSink<W> {
    pub fn new(out: W, width: u32, height: u32) -> Self {
        Self { out, width, height }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for BitmapSink<W> {
    fn present(&mut self, frame: Frame<'_>) -> Result<(), SinkError> {
        let mut buffer = MonoFrame::new(self.width, self.height);
        draw_eink(frame.tree, &mut buffer).unwrap_or_else(|never| match never {});
        for line in buffer.to_text() {
            writeln!(self.out, "{}", line.trim_end())?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Present the widget's current tree once.
pub fn present_once<W: Widget, S: FrameSink>(
    widget: &W,
    sink: &mut S,
    mode: RenderMode,
) -> Result<(), SinkError> {
    let Some(tree) = widget.render() else {
        return Ok(());
    };
    let transition = match mode {
        RenderMode::Full => widget.transition(),
        RenderMode::Incremental => Duration::ZERO,
    };
    sink.present(Frame {
        tree,
        mode,
        transition,
    })
}

/// Drives one widget until shutdown.
pub struct Host<W: Widget, S: FrameSink> {
    widget: W,
    sink: S,
    commands: mpsc::UnboundedReceiver<HostCommand>,
    frames: u64,
}

impl<W: Widget, S: FrameSink> Host<W, S> {
    pub fn new(widget: W, sink: S) -> (Self, HostHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            widget,
            sink,
            commands: rx,
            frames: 0,
        };
        (host, HostHandle { commands: tx })
    }

    /// Frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn present(&mut self, report: &TickReport) -> Result<(), SinkError> {
        present_once(&self.widget, &mut self.sink, report.mode)?;
        self.frames += 1;
        Ok(())
    }

    /// Run until a shutdown command arrives or every handle is dropped.
    /// Returns the widget and sink so callers can inspect them.
    ///
    /// The widget is shut down on every exit, including a sink failure.
    pub async fn run(mut self) -> Result<(W, S), SinkError> {
        let outcome = self.drive().await;
        self.widget.shutdown();
        match outcome {
            Ok(()) => {
                info!("Host stopped after {} frames", self.frames);
                Ok((self.widget, self.sink))
            }
            Err(e) => {
                error!("Host stopped after {} frames: {}", self.frames, e);
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), SinkError> {
        let report = self.widget.initialize();
        self.present(&report)?;
        let mut armed = Some(arm(report.next));

        loop {
            let deadline = armed
                .map(|(_, at)| at)
                .unwrap_or_else(|| Instant::now() + IDLE_WAIT);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(HostCommand::Suspend) => {
                        self.widget.suspend();
                        armed = None;
                    }
                    Some(HostCommand::Resume) => {
                        let report = self.widget.resume();
                        self.present(&report)?;
                        armed = Some(arm(report.next));
                    }
                    Some(HostCommand::Shutdown) | None => return Ok(()),
                },
                _ = sleep_until(deadline), if armed.is_some() => {
                    let Some((generation, _)) = armed.take() else {
                        continue;
                    };
                    if let Some(report) = self.widget.on_timer(generation) {
                        self.present(&report)?;
                        armed = Some(arm(report.next));
                    }
                }
            }
        }
    }
}

fn arm(tick: PendingTick) -> (u64, Instant) {
    debug!("Next tick #{} in {:?}", tick.generation, tick.delay);
    (tick.generation, Instant::now() + tick.delay)
}
