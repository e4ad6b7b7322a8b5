//! Top-level streaming controller.
//!
//! Owns the loop thread, the capture queue and the recording flag:
//!
//! ```text
//! capture callback ──push_audio_block──▶ bounded queue ──▶ controller thread
//!                                                              │
//!                     resample ▶ gate ▶ window ▶ throttle ▶ decode ▶ policy
//!                                                              │
//!                                                              ▼
//!                                                       TranscriptSink
//! ```
//!
//! Everything mutable lives on the controller thread. The capture side only
//! pushes block copies; the loop polls the queue with a short timeout so it
//! notices a cleared recording flag promptly.

use crate::audio::vad::{Clock, SystemClock, VoiceGateConfig};
use crate::defaults;
use crate::error::{EchogateError, Result};
use crate::stt::decoder::{DecodeTask, Decoder};
use crate::streaming::continuous::ContinuousSession;
use crate::streaming::hold::HoldSession;
use crate::streaming::policy::SegmentPolicy;
use crate::streaming::session::Session;
use crate::streaming::sink::TranscriptSink;
use crate::streaming::types::AudioBlock;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Operating mode of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Rolling-window decoding with live partials and auto-finalization.
    #[default]
    Continuous,
    /// Accumulate while recording, decode once when recording stops.
    HoldToTalk,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Continuous => write!(f, "continuous"),
            Mode::HoldToTalk => write!(f, "hold-to-talk"),
        }
    }
}

/// Runtime configuration of a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub mode: Mode,
    /// Rate the decoder expects.
    pub target_sample_rate: u32,
    /// Length of the rolling window (continuous mode).
    pub window: Duration,
    /// Minimum interval between decodes (continuous mode).
    pub decode_every: Duration,
    pub gate: VoiceGateConfig,
    pub policy: SegmentPolicy,
    /// Language code for multilingual decoders, or `auto`.
    pub language: String,
    pub task: DecodeTask,
    /// How long one queue poll waits before re-checking the recording flag.
    pub poll_timeout: Duration,
    /// Blocks the capture queue holds before pushes are refused.
    pub queue_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            target_sample_rate: defaults::TARGET_SAMPLE_RATE,
            window: Duration::from_secs_f64(defaults::WINDOW_SECS),
            decode_every: Duration::from_secs_f64(defaults::DECODE_EVERY_SECS),
            gate: VoiceGateConfig::default(),
            policy: SegmentPolicy::default(),
            language: defaults::AUTO_LANGUAGE.to_string(),
            task: DecodeTask::default(),
            poll_timeout: Duration::from_millis(defaults::POLL_TIMEOUT_MS),
            queue_capacity: defaults::QUEUE_CAPACITY,
        }
    }
}

impl ControllerConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Externally owned recording flag: one writer, any number of readers.
#[derive(Debug, Clone, Default)]
pub struct RecordingFlag(Arc<AtomicBool>);

impl RecordingFlag {
    /// Creates a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_recording(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Capture-side entry point of a running controller.
///
/// Cheap to clone and safe to call from any thread, including a real-time
/// audio callback: pushing never blocks.
#[derive(Debug, Clone)]
pub struct AudioInput {
    tx: Sender<AudioBlock>,
    sequence: Arc<AtomicU64>,
}

impl AudioInput {
    pub(crate) fn new(tx: Sender<AudioBlock>) -> Self {
        Self {
            tx,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues a block of mono samples captured at `source_rate`.
    ///
    /// # Errors
    /// `QueueFull` when the controller is falling behind (the block is
    /// dropped), `ControllerStopped` once the controller thread has exited.
    pub fn push_audio_block(&self, samples: impl Into<Vec<f32>>, source_rate: u32) -> Result<()> {
        let samples = samples.into();
        let len = samples.len();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        match self
            .tx
            .try_send(AudioBlock::new(samples, source_rate, sequence))
        {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EchogateError::QueueFull { samples: len }),
            Err(TrySendError::Disconnected(_)) => Err(EchogateError::ControllerStopped),
        }
    }
}

/// Streaming transcription controller.
///
/// Each [`start`](Self::start) runs one recording on a fresh thread with a
/// fresh session, so a controller can be started again after the previous
/// recording was joined.
pub struct StreamingController {
    config: ControllerConfig,
    decoder: Arc<dyn Decoder>,
    flag: RecordingFlag,
    clock: Arc<dyn Clock>,
}

impl StreamingController {
    pub fn new(config: ControllerConfig, decoder: Arc<dyn Decoder>, flag: RecordingFlag) -> Self {
        Self {
            config,
            decoder,
            flag,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source (for deterministic tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn flag(&self) -> &RecordingFlag {
        &self.flag
    }

    /// Builds the session for the configured mode, starting now.
    fn new_session(&self) -> Box<dyn Session> {
        match self.config.mode {
            Mode::Continuous => Box::new(ContinuousSession::new(
                &self.config,
                Arc::clone(&self.decoder),
                self.clock.now(),
            )),
            Mode::HoldToTalk => Box::new(HoldSession::new(&self.config, Arc::clone(&self.decoder))),
        }
    }

    /// Sets the recording flag and spawns the loop thread.
    ///
    /// The thread runs until the flag is cleared, then finishes the session
    /// and hands `sink` back through [`ControllerHandle::join`].
    ///
    /// # Errors
    /// `ControllerThread` if the thread cannot be spawned.
    pub fn start(&self, sink: Box<dyn TranscriptSink>) -> Result<ControllerHandle> {
        let (tx, rx) = crossbeam_channel::bounded(self.config.queue_capacity.max(1));
        let session = self.new_session();
        let session_name = session.name();

        self.flag.start();

        let flag = self.flag.clone();
        let clock = Arc::clone(&self.clock);
        let poll_timeout = self.config.poll_timeout;

        let thread = thread::Builder::new()
            .name("echogate-controller".to_string())
            .spawn(move || run_loop(session, rx, flag, clock, poll_timeout, sink))
            .map_err(|e| {
                self.flag.stop();
                EchogateError::ControllerThread {
                    message: format!("failed to spawn controller thread: {}", e),
                }
            })?;

        tracing::info!(
            mode = session_name,
            decoder = self.decoder.model_name(),
            "recording started"
        );

        Ok(ControllerHandle {
            input: AudioInput::new(tx),
            flag: self.flag.clone(),
            thread: Some(thread),
        })
    }
}

fn run_loop(
    mut session: Box<dyn Session>,
    rx: Receiver<AudioBlock>,
    flag: RecordingFlag,
    clock: Arc<dyn Clock>,
    poll_timeout: Duration,
    mut sink: Box<dyn TranscriptSink>,
) -> Box<dyn TranscriptSink> {
    let mut next_sequence = 0u64;

    while flag.is_recording() {
        match rx.recv_timeout(poll_timeout) {
            Ok(block) => {
                check_sequence(&block, &mut next_sequence);
                session.ingest(&block.samples, block.sample_rate, clock.now(), sink.as_mut());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("all audio inputs dropped, stopping");
                break;
            }
        }
    }

    if session.drain_on_stop() {
        let pending: Vec<AudioBlock> = rx.try_iter().collect();
        if !pending.is_empty() {
            tracing::debug!(blocks = pending.len(), "draining queued audio after release");
        }
        for block in pending {
            check_sequence(&block, &mut next_sequence);
            session.ingest(&block.samples, block.sample_rate, clock.now(), sink.as_mut());
        }
    }

    session.finish(clock.now(), sink.as_mut());
    tracing::info!(mode = session.name(), sink = sink.name(), "recording stopped");
    sink
}

/// Warns about blocks refused by a full queue (their sequence numbers are skipped).
fn check_sequence(block: &AudioBlock, next_sequence: &mut u64) {
    if block.sequence > *next_sequence {
        tracing::warn!(
            missing = block.sequence - *next_sequence,
            "audio blocks dropped before reaching the controller"
        );
    }
    *next_sequence = block.sequence + 1;
}

/// Handle to a running recording.
///
/// Dropping the handle clears the recording flag and detaches the thread.
pub struct ControllerHandle {
    input: AudioInput,
    flag: RecordingFlag,
    thread: Option<JoinHandle<Box<dyn TranscriptSink>>>,
}

impl ControllerHandle {
    /// A capture-side input for this recording.
    pub fn input(&self) -> AudioInput {
        self.input.clone()
    }

    /// Shorthand for `input().push_audio_block(..)`.
    pub fn push_audio_block(&self, samples: impl Into<Vec<f32>>, source_rate: u32) -> Result<()> {
        self.input.push_audio_block(samples, source_rate)
    }

    pub fn is_recording(&self) -> bool {
        self.flag.is_recording()
    }

    /// True once the loop thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Clears the recording flag and waits for the final flush.
    pub fn stop(self) -> Result<Box<dyn TranscriptSink>> {
        self.flag.stop();
        self.join()
    }

    /// Waits for the loop to exit (after someone clears the flag) and returns
    /// the sink.
    pub fn join(mut self) -> Result<Box<dyn TranscriptSink>> {
        let thread = self.thread.take().ok_or(EchogateError::ControllerStopped)?;
        thread.join().map_err(|panic_info| {
            let message = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic")
                .to_string();
            EchogateError::ControllerThread { message }
        })
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.flag.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::decoder::MockDecoder;
    use crate::streaming::sink::CollectorSink;

    #[test]
    fn recording_flag_toggles() {
        let flag = RecordingFlag::new();
        assert!(!flag.is_recording());

        let reader = flag.clone();
        flag.start();
        assert!(reader.is_recording());
        flag.stop();
        assert!(!reader.is_recording());
    }

    #[test]
    fn full_queue_rejects_block() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let input = AudioInput::new(tx);

        assert!(input.push_audio_block(vec![0.0; 10], 16000).is_ok());
        match input.push_audio_block(vec![0.0; 10], 16000) {
            Err(EchogateError::QueueFull { samples }) => assert_eq!(samples, 10),
            other => panic!("expected QueueFull, got {:?}", other),
        }
    }

    #[test]
    fn closed_queue_reports_stopped() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        drop(rx);
        let input = AudioInput::new(tx);

        assert!(matches!(
            input.push_audio_block(&[0.0f32; 4][..], 16000),
            Err(EchogateError::ControllerStopped)
        ));
    }

    #[test]
    fn blocks_carry_increasing_sequence_numbers() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let input = AudioInput::new(tx);
        let clone = input.clone();

        input.push_audio_block(vec![0.1], 48000).unwrap();
        clone.push_audio_block(vec![0.2], 44100).unwrap();

        let blocks: Vec<AudioBlock> = rx.try_iter().collect();
        assert_eq!(blocks[0].sequence, 0);
        assert_eq!(blocks[1].sequence, 1);
        assert_eq!(blocks[1].sample_rate, 44100);
    }

    #[test]
    fn mode_names() {
        assert_eq!(Mode::HoldToTalk.to_string(), "hold-to-talk");
        #[derive(Deserialize)]
        struct Wrapper {
            mode: Mode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"hold-to-talk\"").unwrap();
        assert_eq!(parsed.mode, Mode::HoldToTalk);
    }

    #[test]
    fn start_then_stop_without_audio_finalizes_once() {
        let sink = CollectorSink::new();
        let controller = StreamingController::new(
            ControllerConfig::default(),
            Arc::new(MockDecoder::new("m")),
            RecordingFlag::new(),
        );

        let handle = controller.start(Box::new(sink.clone())).unwrap();
        assert!(handle.is_recording());
        handle.stop().unwrap();

        assert!(!controller.flag().is_recording());
        assert_eq!(sink.finalizations().len(), 1);
        assert!(sink.partials().is_empty());
    }

    #[test]
    fn dropping_handle_clears_flag() {
        let flag = RecordingFlag::new();
        let controller = StreamingController::new(
            ControllerConfig::default(),
            Arc::new(MockDecoder::new("m")),
            flag.clone(),
        );

        let handle = controller.start(Box::new(CollectorSink::new())).unwrap();
        assert!(flag.is_recording());
        drop(handle);
        assert!(!flag.is_recording());
    }
}
