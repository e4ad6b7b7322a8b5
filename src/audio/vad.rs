//! Voice activity gate.
//!
//! Classifies each incoming block as loud or quiet by RMS energy and keeps a
//! short hangover so a gap between phonemes does not flip the speaker to
//! silent.

use crate::defaults;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Manually advanced clock for deterministic timing tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Instant>>,
}

impl MockClock {
    /// Creates a mock clock frozen at the current instant.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a mock clock frozen at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += duration;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Configuration for the voice activity gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceGateConfig {
    /// Raw RMS above which a block counts as speech.
    pub threshold: f32,
    /// How long after the last loud block the speaker still counts as talking.
    pub hangover: Duration,
}

impl Default for VoiceGateConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::GATE_THRESHOLD,
            hangover: Duration::from_secs_f64(defaults::HANGOVER_SECS),
        }
    }
}

/// Voice activity at one instant, as seen by the segment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceActivity {
    /// Within the hangover of the last loud block.
    pub speaking: bool,
    /// Time since the last loud block (or since the gate started, if none).
    pub silence_for: Duration,
    /// When the last loud block arrived.
    pub last_speech: Option<Instant>,
}

impl VoiceActivity {
    /// True if a loud block arrived strictly after `instant`.
    pub fn spoke_since(&self, instant: Instant) -> bool {
        self.last_speech.is_some_and(|t| t > instant)
    }
}

/// RMS energy gate with hangover.
#[derive(Debug, Clone)]
pub struct VoiceGate {
    config: VoiceGateConfig,
    started: Instant,
    last_speech: Option<Instant>,
    level: f32,
}

impl VoiceGate {
    /// Creates a gate that has heard nothing since `started`.
    pub fn new(config: VoiceGateConfig, started: Instant) -> Self {
        Self {
            config,
            started,
            last_speech: None,
            level: 0.0,
        }
    }

    /// Feeds one block observed at `now` and returns whether the speaker is
    /// currently talking.
    pub fn update(&mut self, block: &[f32], now: Instant) -> bool {
        if !block.is_empty() {
            self.level = calculate_rms(block);
            if self.level > self.config.threshold {
                self.last_speech = Some(now);
            }
        }
        self.is_speaking(now)
    }

    /// Whether `now` falls within the hangover of the last loud block.
    pub fn is_speaking(&self, now: Instant) -> bool {
        self.last_speech
            .is_some_and(|t| now.saturating_duration_since(t) < self.config.hangover)
    }

    /// Time since the last loud block, or since the gate started.
    pub fn silence_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_speech.unwrap_or(self.started))
    }

    pub fn activity(&self, now: Instant) -> VoiceActivity {
        VoiceActivity {
            speaking: self.is_speaking(now),
            silence_for: self.silence_for(now),
            last_speech: self.last_speech,
        }
    }

    /// RMS of the most recent non-empty block.
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Updates the threshold without touching timing state.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.config.threshold = threshold;
    }
}

/// Root mean square of `samples`: `sqrt(mean(x^2) + epsilon)`.
///
/// Empty input has no energy and returns 0.0.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let mean_square = sum_squares / samples.len() as f64;
    (mean_square + defaults::RMS_EPSILON).sqrt() as f32
}
