//! Terminal rendering of transcript events.
//!
//! Partials overwrite a single live line on stderr. Finalized segments go to
//! stdout as `[HH:MM:SS - HH:MM:SS] text`, so piping stdout captures only
//! committed text.

use crate::audio::vad::Clock;
use crate::cli::OutputFormat;
use crate::error::EchogateError;
use crate::streaming::sink::TranscriptSink;
use crate::streaming::types::TranscriptEvent;
use owo_colors::OwoColorize;
use serde_json::json;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const CLEAR_LINE: &str = "\r\x1b[2K";
const BAR_WIDTH: usize = 30;

/// Formats an offset from the start of the recording as `HH:MM:SS`.
pub fn format_offset(offset: Duration) -> String {
    let secs = offset.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// One finalized segment as printed in text mode.
pub fn render_segment(start: Duration, end: Duration, text: &str) -> String {
    format!("[{} - {}] {}", format_offset(start), format_offset(end), text)
}

fn bar_position(value: f32) -> usize {
    // Log scale: 0.001..0.5 maps onto the full bar
    if value > 0.001 {
        ((value.log10() + 3.0) / 2.7 * BAR_WIDTH as f32).clamp(0.0, BAR_WIDTH as f32) as usize
    } else {
        0
    }
}

/// Input level bar with the gate threshold marked.
///
/// Full blocks mean the level is above the threshold, shaded blocks below.
pub fn format_level_bar(level: f32, threshold: f32) -> String {
    let filled = bar_position(level);
    let threshold_pos = bar_position(threshold);

    let bar: String = (0..BAR_WIDTH)
        .map(|i| {
            if i < filled {
                if level > threshold { '█' } else { '▓' }
            } else if i == threshold_pos {
                '│'
            } else {
                '░'
            }
        })
        .collect();

    format!("[{}] {:.3}", bar, level)
}

/// Latest capture level, written from the audio callback and read by the UI.
#[derive(Debug, Clone, Default)]
pub struct LevelMonitor(Arc<AtomicU32>);

impl LevelMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, rms: f32) {
        self.0.store(rms.to_bits(), Ordering::Relaxed);
    }

    pub fn level(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Console output for transcript events.
///
/// Usable directly as a [`TranscriptSink`] (replay runs the session on the
/// calling thread) or fed events received from a
/// [`ChannelSink`](crate::streaming::sink::ChannelSink) via [`Console::handle`].
pub struct Console<O = io::Stdout, E = io::Stderr> {
    out: O,
    err: E,
    clock: Arc<dyn Clock>,
    origin: Instant,
    format: OutputFormat,
    show_live: bool,
    segment_start: Option<Instant>,
    live: String,
}

impl Console {
    /// Console on the process stdout/stderr.
    pub fn stdio(clock: Arc<dyn Clock>, format: OutputFormat, quiet: bool) -> Self {
        Self::with_writers(io::stdout(), io::stderr(), clock, format, quiet)
    }
}

impl<O: Write, E: Write> Console<O, E> {
    /// Console writing committed output to `out` and live output to `err`.
    ///
    /// Offsets are measured from the clock's current instant. `quiet` hides
    /// partials and progress.
    pub fn with_writers(
        out: O,
        err: E,
        clock: Arc<dyn Clock>,
        format: OutputFormat,
        quiet: bool,
    ) -> Self {
        let origin = clock.now();
        Self {
            out,
            err,
            clock,
            origin,
            format,
            show_live: !quiet,
            segment_start: None,
            live: String::new(),
        }
    }

    /// True while an unfinished partial is on screen.
    pub fn has_live_text(&self) -> bool {
        !self.live.is_empty()
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    fn offset(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.origin)
    }

    /// Renders one event.
    ///
    /// Terminal write failures are ignored: there is nowhere left to report them.
    pub fn handle(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Partial(text) => self.partial(text),
            TranscriptEvent::Finalized(at) => self.finalized(at),
            TranscriptEvent::Progress(percent) => self.progress(percent),
            TranscriptEvent::DecodeError(message) => self.decode_error(&message),
        }
    }

    fn partial(&mut self, text: String) {
        let now = self.clock.now();
        let start = *self.segment_start.get_or_insert(now);

        match self.format {
            OutputFormat::Text => {
                if self.show_live {
                    write!(self.err, "{CLEAR_LINE}{}", text.dimmed()).ok();
                    self.err.flush().ok();
                }
            }
            OutputFormat::Json => {
                if self.show_live {
                    let line = json!({
                        "type": "partial",
                        "text": text,
                        "start": self.offset(start).as_secs_f64(),
                        "at": self.offset(now).as_secs_f64(),
                    });
                    writeln!(self.out, "{}", line).ok();
                }
            }
        }
        self.live = text;
    }

    fn finalized(&mut self, at: Instant) {
        let start = self.segment_start.take().unwrap_or(at);
        let text = std::mem::take(&mut self.live);

        match self.format {
            OutputFormat::Text => {
                if self.show_live {
                    write!(self.err, "{CLEAR_LINE}").ok();
                    self.err.flush().ok();
                }
                if !text.is_empty() {
                    let line = render_segment(self.offset(start), self.offset(at), &text);
                    writeln!(self.out, "{}", line).ok();
                }
            }
            OutputFormat::Json => {
                let line = json!({
                    "type": "final",
                    "text": text,
                    "start": self.offset(start).as_secs_f64(),
                    "end": self.offset(at).as_secs_f64(),
                });
                writeln!(self.out, "{}", line).ok();
            }
        }
        self.out.flush().ok();
    }

    fn progress(&mut self, percent: u8) {
        if !self.show_live {
            return;
        }
        match self.format {
            OutputFormat::Text => {
                write!(self.err, "{CLEAR_LINE}{}", format!("decoding… {percent}%").dimmed()).ok();
                self.err.flush().ok();
            }
            OutputFormat::Json => {
                writeln!(self.out, "{}", json!({ "type": "progress", "percent": percent })).ok();
            }
        }
    }

    fn decode_error(&mut self, message: &str) {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.err, "{CLEAR_LINE}{}", format!("Error: {message}").red()).ok();
                if self.show_live && !self.live.is_empty() {
                    write!(self.err, "{}", self.live.dimmed()).ok();
                }
            }
            OutputFormat::Json => {
                writeln!(
                    self.out,
                    "{}",
                    json!({ "type": "decode_error", "message": message })
                )
                .ok();
            }
        }
    }

    /// Shows the input level when no partial occupies the live line.
    pub fn show_level(&mut self, level: f32, threshold: f32) {
        if self.format != OutputFormat::Text || !self.show_live || self.has_live_text() {
            return;
        }
        write!(self.err, "{CLEAR_LINE}{}", format_level_bar(level, threshold)).ok();
        self.err.flush().ok();
    }
}

impl<O: Write + Send + 'static, E: Write + Send + 'static> TranscriptSink for Console<O, E> {
    fn on_partial(&mut self, text: &str) {
        self.handle(TranscriptEvent::Partial(text.to_string()));
    }

    fn on_finalize(&mut self, at: Instant) {
        self.handle(TranscriptEvent::Finalized(at));
    }

    fn on_progress(&mut self, percent: u8) {
        self.handle(TranscriptEvent::Progress(percent));
    }

    fn on_decode_error(&mut self, error: &EchogateError) {
        self.handle(TranscriptEvent::DecodeError(error.to_string()));
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
