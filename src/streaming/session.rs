//! The per-recording state machine driven by the controller loop.

use crate::streaming::sink::TranscriptSink;
use std::time::Instant;

/// One recording session: consumes blocks, talks to a sink.
///
/// A session lives on the controller thread for exactly one recording and
/// owns all of its state. The loop calls [`ingest`](Session::ingest) per
/// block and [`finish`](Session::finish) once when recording stops.
pub trait Session: Send + 'static {
    /// Processes one block captured at `source_rate`, observed at `now`.
    fn ingest(
        &mut self,
        samples: &[f32],
        source_rate: u32,
        now: Instant,
        sink: &mut dyn TranscriptSink,
    );

    /// Closes the session when recording stops.
    fn finish(&mut self, now: Instant, sink: &mut dyn TranscriptSink);

    /// Whether blocks still queued at stop belong to this session.
    fn drain_on_stop(&self) -> bool {
        false
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str;
}
