//! Continuous mode: rolling-window decoding with live partials.

use crate::audio::resample::resample;
use crate::audio::vad::VoiceGate;
use crate::audio::window::RollingWindow;
use crate::stt::decoder::{DecodeOptions, Decoder};
use crate::streaming::controller::ControllerConfig;
use crate::streaming::policy::SegmentTracker;
use crate::streaming::session::Session;
use crate::streaming::sink::TranscriptSink;
use crate::streaming::throttle::DecodeThrottle;
use std::sync::Arc;
use std::time::Instant;

/// Decodes the last few seconds of audio on a fixed cadence and turns the
/// results into partials and finalizations.
pub struct ContinuousSession {
    decoder: Arc<dyn Decoder>,
    options: DecodeOptions,
    target_rate: u32,
    window: RollingWindow,
    gate: VoiceGate,
    throttle: DecodeThrottle,
    segment: SegmentTracker,
    decodes: u64,
    locked_skips: u64,
}

impl ContinuousSession {
    /// Starts a session at `started` with a silent window.
    pub fn new(config: &ControllerConfig, decoder: Arc<dyn Decoder>, started: Instant) -> Self {
        let options =
            DecodeOptions::for_decoder(decoder.is_multilingual(), &config.language, config.task);

        Self {
            decoder,
            options,
            target_rate: config.target_sample_rate,
            window: RollingWindow::new(config.window, config.target_sample_rate),
            gate: VoiceGate::new(config.gate, started),
            throttle: DecodeThrottle::new(config.decode_every),
            segment: SegmentTracker::new(config.policy.clone(), started),
            decodes: 0,
            locked_skips: 0,
        }
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn gate(&self) -> &VoiceGate {
        &self.gate
    }

    pub fn segment(&self) -> &SegmentTracker {
        &self.segment
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Successful decoder calls so far.
    pub fn decodes(&self) -> u64 {
        self.decodes
    }

    /// Decode cycles skipped since the last finalization because nobody
    /// has spoken yet.
    pub fn locked_skips(&self) -> u64 {
        self.locked_skips
    }

    fn decode_window(&mut self, now: Instant, sink: &mut dyn TranscriptSink) {
        let activity = self.gate.activity(now);
        if !self.segment.accepts_decodes(&activity) {
            self.locked_skips += 1;
            if self.locked_skips == 1 {
                tracing::debug!(
                    level = self.gate.level(),
                    threshold = self.gate.threshold(),
                    "segment locked, skipping decodes until the voice gate opens"
                );
            }
            return;
        }
        if self.locked_skips > 0 {
            tracing::debug!(skipped = self.locked_skips, "voice gate reopened after finalization");
            self.locked_skips = 0;
        }
        if !self.throttle.should_decode(now) {
            return;
        }

        let text = match self.decoder.decode(self.window.as_slice(), &self.options) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("decode failed, skipping cycle: {}", e);
                sink.on_decode_error(&e);
                return;
            }
        };
        self.decodes += 1;

        let decision = self.segment.observe(&text, &activity, now);
        if let Some(partial) = decision.partial {
            sink.on_partial(&partial);
        }
        if decision.finalize {
            sink.on_finalize(now);
            // Committed audio must not be transcribed again by the next segment
            self.window.silence();
        }
    }
}

impl Session for ContinuousSession {
    fn ingest(
        &mut self,
        samples: &[f32],
        source_rate: u32,
        now: Instant,
        sink: &mut dyn TranscriptSink,
    ) {
        self.gate.update(samples, now);
        let resampled = resample(samples, source_rate, self.target_rate);
        self.window.push(&resampled);

        self.decode_window(now, sink);
    }

    /// Shows any text that never made it out, then finalizes unconditionally.
    fn finish(&mut self, now: Instant, sink: &mut dyn TranscriptSink) {
        if let Some(pending) = self.segment.take_pending() {
            sink.on_partial(&pending);
        }
        sink.on_finalize(now);
        self.segment.reset(now);
        self.window.silence();

        tracing::debug!(decodes = self.decodes, "continuous session finished");
    }

    fn name(&self) -> &'static str {
        "continuous"
    }
}
