//! Output side of the controller.

use crate::error::EchogateError;
use crate::streaming::types::TranscriptEvent;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Receives transcript updates from the controller thread.
///
/// Methods are called from the controller thread only. Implementations that
/// drive a UI must marshal the update onto the UI thread themselves.
pub trait TranscriptSink: Send + 'static {
    /// New in-progress text for the current segment.
    fn on_partial(&mut self, text: &str);

    /// The current segment is complete.
    fn on_finalize(&mut self, at: Instant);

    /// Advisory hold-to-talk progress, 0-100.
    fn on_progress(&mut self, _percent: u8) {}

    /// A decode failed and its cycle was skipped.
    fn on_decode_error(&mut self, _error: &EchogateError) {}

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

impl<S: TranscriptSink + ?Sized> TranscriptSink for Box<S> {
    fn on_partial(&mut self, text: &str) {
        (**self).on_partial(text)
    }

    fn on_finalize(&mut self, at: Instant) {
        (**self).on_finalize(at)
    }

    fn on_progress(&mut self, percent: u8) {
        (**self).on_progress(percent)
    }

    fn on_decode_error(&mut self, error: &EchogateError) {
        (**self).on_decode_error(error)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Records every event, for tests and for replaying into other outputs.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    events: Arc<Mutex<Vec<TranscriptEvent>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: TranscriptEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<TranscriptEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Partial texts in emission order.
    pub fn partials(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TranscriptEvent::Partial(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Instants passed to `on_finalize`.
    pub fn finalizations(&self) -> Vec<Instant> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TranscriptEvent::Finalized(at) => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TranscriptEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn decode_errors(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TranscriptEvent::DecodeError(_)))
            .count()
    }

    /// Last partial shown before the most recent finalization.
    pub fn last_finalized_text(&self) -> Option<String> {
        let events = self.events();
        let end = events.iter().rposition(TranscriptEvent::is_finalized)?;
        events[..end].iter().rev().find_map(|e| match e {
            TranscriptEvent::Partial(text) => Some(text.clone()),
            _ => None,
        })
    }
}

impl TranscriptSink for CollectorSink {
    fn on_partial(&mut self, text: &str) {
        self.record(TranscriptEvent::Partial(text.to_string()));
    }

    fn on_finalize(&mut self, at: Instant) {
        self.record(TranscriptEvent::Finalized(at));
    }

    fn on_progress(&mut self, percent: u8) {
        self.record(TranscriptEvent::Progress(percent));
    }

    fn on_decode_error(&mut self, error: &EchogateError) {
        self.record(TranscriptEvent::DecodeError(error.to_string()));
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Forwards events over a channel, e.g. to a UI thread.
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<TranscriptEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<TranscriptEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: TranscriptEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("transcript receiver dropped, discarding event");
        }
    }
}

impl TranscriptSink for ChannelSink {
    fn on_partial(&mut self, text: &str) {
        self.forward(TranscriptEvent::Partial(text.to_string()));
    }

    fn on_finalize(&mut self, at: Instant) {
        self.forward(TranscriptEvent::Finalized(at));
    }

    fn on_progress(&mut self, percent: u8) {
        self.forward(TranscriptEvent::Progress(percent));
    }

    fn on_decode_error(&mut self, error: &EchogateError) {
        self.forward(TranscriptEvent::DecodeError(error.to_string()));
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
