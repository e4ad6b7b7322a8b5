//! Hold-to-talk mode: accumulate while held, decode once on release.

use crate::audio::resample::resample;
use crate::stt::decoder::{DecodeOptions, Decoder};
use crate::streaming::controller::ControllerConfig;
use crate::streaming::session::Session;
use crate::streaming::sink::TranscriptSink;
use std::sync::Arc;
use std::time::Instant;

/// Progress milestones reported on release.
pub mod progress {
    /// Capture ended.
    pub const CAPTURED: u8 = 10;
    /// Audio assembled for the decoder.
    pub const PREPARED: u8 = 35;
    /// Decoder returned.
    pub const DECODED: u8 = 92;
    /// Segment finalized.
    pub const DONE: u8 = 100;
}

/// Collects resampled blocks while the key is held.
pub struct HoldSession {
    decoder: Arc<dyn Decoder>,
    options: DecodeOptions,
    target_rate: u32,
    blocks: Vec<Vec<f32>>,
    held_samples: usize,
}

impl HoldSession {
    pub fn new(config: &ControllerConfig, decoder: Arc<dyn Decoder>) -> Self {
        let options =
            DecodeOptions::for_decoder(decoder.is_multilingual(), &config.language, config.task);

        Self {
            decoder,
            options,
            target_rate: config.target_sample_rate,
            blocks: Vec::new(),
            held_samples: 0,
        }
    }

    /// Samples accumulated so far, at the target rate.
    pub fn held_samples(&self) -> usize {
        self.held_samples
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }
}

impl Session for HoldSession {
    fn ingest(
        &mut self,
        samples: &[f32],
        source_rate: u32,
        _now: Instant,
        _sink: &mut dyn TranscriptSink,
    ) {
        let resampled = resample(samples, source_rate, self.target_rate);
        if resampled.is_empty() {
            return;
        }
        self.held_samples += resampled.len();
        self.blocks.push(resampled.into_owned());
    }

    /// Release: one decode over everything held, one partial, one finalize.
    fn finish(&mut self, now: Instant, sink: &mut dyn TranscriptSink) {
        let blocks = std::mem::take(&mut self.blocks);
        let held = std::mem::take(&mut self.held_samples);

        if held == 0 {
            tracing::debug!("released with no audio, finalizing empty segment");
            sink.on_finalize(now);
            return;
        }

        sink.on_progress(progress::CAPTURED);
        let audio = blocks.concat();
        sink.on_progress(progress::PREPARED);

        tracing::debug!(
            samples = audio.len(),
            secs = audio.len() as f64 / self.target_rate.max(1) as f64,
            "decoding held audio"
        );

        match self.decoder.decode(&audio, &self.options) {
            Ok(text) => {
                sink.on_progress(progress::DECODED);
                let text = text.trim();
                if !text.is_empty() {
                    sink.on_partial(text);
                }
            }
            Err(e) => {
                tracing::warn!("decode failed on release: {}", e);
                sink.on_decode_error(&e);
            }
        }

        sink.on_progress(progress::DONE);
        sink.on_finalize(now);
    }

    fn drain_on_stop(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "hold-to-talk"
    }
}
