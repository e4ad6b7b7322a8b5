//! Partial-text stability, suppression and finalization.
//!
//! A segment is either open ([`Phase::Live`]) or just committed
//! ([`Phase::Locked`]). Every decode result goes through
//! [`SegmentTracker::observe`], which decides whether the text is shown and
//! whether the segment is finalized:
//!
//! ```text
//!            text non-empty and
//!   (silent >= 0.8s and unchanged >= 0.5s) or (ends in . ? ! … ، ؛ and silent >= 0.3s)
//!   LIVE ──────────────────────────────────────────────────────────────────────▶ LOCKED
//!    ▲                                                                            │
//!    └──────────────────────── voice gate fires again ────────────────────────────┘
//! ```

use crate::audio::vad::VoiceActivity;
use crate::defaults;
use std::time::{Duration, Instant};

/// Tunable thresholds of the segment policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPolicy {
    /// Silence needed before a stable segment is finalized.
    pub finalize_silence: Duration,
    /// How long the text must stay unchanged for the silence rule.
    pub stable_min: Duration,
    /// Silence needed when the text ends with terminal punctuation.
    pub punctuation_grace: Duration,
    /// Minimum growth, in characters, for a partial to show while silent.
    pub min_emit_chars_silent: usize,
    /// Marks that end a sentence.
    pub terminal_punctuation: Vec<String>,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            finalize_silence: Duration::from_secs_f64(defaults::FINALIZE_SILENCE_SECS),
            stable_min: Duration::from_secs_f64(defaults::STABLE_MIN_SECS),
            punctuation_grace: Duration::from_secs_f64(defaults::PUNCTUATION_GRACE_SECS),
            min_emit_chars_silent: defaults::MIN_EMIT_CHARS_SILENT,
            terminal_punctuation: defaults::TERMINAL_PUNCTUATION
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl SegmentPolicy {
    /// Whether `text` ends with one of the terminal punctuation marks.
    pub fn ends_sentence(&self, text: &str) -> bool {
        let text = text.trim_end();
        self.terminal_punctuation
            .iter()
            .any(|mark| !mark.is_empty() && text.ends_with(mark.as_str()))
    }
}

/// Lifecycle of the current segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Segment open; decodes update and may finalize it.
    Live,
    /// Segment finalized at `since`; decodes are ignored until the speaker
    /// is heard again.
    Locked { since: Instant },
}

/// What the caller must do after a decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    /// Text to hand to `on_partial`.
    pub partial: Option<String>,
    /// Whether to call `on_finalize` after the partial.
    pub finalize: bool,
}

impl Decision {
    fn none() -> Self {
        Self::default()
    }
}

/// Tracks the transcription in progress.
#[derive(Debug, Clone)]
pub struct SegmentTracker {
    policy: SegmentPolicy,
    current_text: String,
    last_emitted_text: String,
    segment_start: Instant,
    last_change: Instant,
    phase: Phase,
}

impl SegmentTracker {
    /// Opens the first segment at `now`.
    pub fn new(policy: SegmentPolicy, now: Instant) -> Self {
        Self {
            policy,
            current_text: String::new(),
            last_emitted_text: String::new(),
            segment_start: now,
            last_change: now,
            phase: Phase::Live,
        }
    }

    pub fn policy(&self) -> &SegmentPolicy {
        &self.policy
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn last_emitted_text(&self) -> &str {
        &self.last_emitted_text
    }

    pub fn segment_start(&self) -> Instant {
        self.segment_start
    }

    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    /// Whether a decode at this point can affect the segment.
    ///
    /// False while locked and nobody has spoken since the last finalization.
    pub fn accepts_decodes(&self, activity: &VoiceActivity) -> bool {
        match self.phase {
            Phase::Live => true,
            Phase::Locked { since } => activity.spoke_since(since),
        }
    }

    /// Suppression rule for a freshly decoded `text`.
    ///
    /// Never shows empty text or a repeat of what is already shown. While the
    /// speaker is active anything else is shown; while silent only growth of
    /// at least `min_emit_chars_silent` characters, or the first text of a
    /// segment, gets through.
    pub fn should_emit(&self, text: &str, speaking: bool) -> bool {
        if text.is_empty() || text == self.last_emitted_text {
            return false;
        }
        if speaking {
            return true;
        }

        let delta_len = text
            .chars()
            .count()
            .saturating_sub(self.last_emitted_text.chars().count());
        delta_len >= self.policy.min_emit_chars_silent || self.last_emitted_text.is_empty()
    }

    /// Finalization guard for the current text at `now`.
    pub fn ready_to_finalize(&self, silence_for: Duration, now: Instant) -> bool {
        if self.phase != Phase::Live || self.current_text.is_empty() {
            return false;
        }

        let unchanged_for = now.saturating_duration_since(self.last_change);
        let settled =
            silence_for >= self.policy.finalize_silence && unchanged_for >= self.policy.stable_min;
        let punctuated = self.policy.ends_sentence(&self.current_text)
            && silence_for >= self.policy.punctuation_grace;

        settled || punctuated
    }

    /// Feeds one decode result and returns the resulting actions.
    pub fn observe(&mut self, text: &str, activity: &VoiceActivity, now: Instant) -> Decision {
        if let Phase::Locked { since } = self.phase {
            if !activity.spoke_since(since) {
                return Decision::none();
            }
            tracing::debug!("speech after finalization, opening new segment");
            self.phase = Phase::Live;
            self.segment_start = now;
        }

        let text = text.trim();
        if text != self.current_text {
            self.current_text = text.to_string();
            self.last_change = now;
        }

        let mut decision = Decision::none();
        if self.should_emit(text, activity.speaking) {
            self.last_emitted_text = text.to_string();
            decision.partial = Some(text.to_string());
        }

        if self.ready_to_finalize(activity.silence_for, now) {
            if self.current_text != self.last_emitted_text {
                decision.partial = Some(self.current_text.clone());
            }
            tracing::debug!(
                text = %self.current_text,
                silence_ms = activity.silence_for.as_millis() as u64,
                "finalizing segment"
            );
            decision.finalize = true;
            self.reset(now);
        }

        decision
    }

    /// Shutdown flush: the last decoded text if it was never shown.
    pub fn take_pending(&mut self) -> Option<String> {
        if self.current_text.is_empty() || self.current_text == self.last_emitted_text {
            return None;
        }
        self.last_emitted_text = self.current_text.clone();
        Some(self.current_text.clone())
    }

    /// Clears the segment after finalization and locks it.
    pub fn reset(&mut self, now: Instant) {
        self.current_text.clear();
        self.last_emitted_text.clear();
        self.segment_start = now;
        self.last_change = now;
        self.phase = Phase::Locked { since: now };
    }
}
