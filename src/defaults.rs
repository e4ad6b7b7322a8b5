//! Default configuration constants for echogate.
//!
//! Shared by the TOML config layer and the runtime `ControllerConfig` so both
//! agree on what an unset option means. The timing values are empirical
//! tunings, not structural limits.

/// Sample rate the decoder expects, in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Length of the rolling decode window in seconds.
pub const WINDOW_SECS: f64 = 8.0;

/// Minimum wall-clock interval between two decoder calls in seconds.
pub const DECODE_EVERY_SECS: f64 = 0.5;

/// Silence required before a stable segment is finalized, in seconds.
pub const FINALIZE_SILENCE_SECS: f64 = 0.8;

/// How long the decoded text must stay unchanged before silence finalization.
pub const STABLE_MIN_SECS: f64 = 0.5;

/// Silence required to finalize text that ends in terminal punctuation.
pub const PUNCTUATION_GRACE_SECS: f64 = 0.3;

/// Grace period after the last loud block during which the speaker still
/// counts as talking.
pub const HANGOVER_SECS: f64 = 0.25;

/// Minimum growth in characters for a partial to be shown while silent.
pub const MIN_EMIT_CHARS_SILENT: usize = 3;

/// Voice gate RMS threshold, compared against raw (not normalized) block RMS.
///
/// The usable range on typical laptop microphones is roughly 0.009 to 0.015.
pub const GATE_THRESHOLD: f32 = 0.012;

/// Added under the square root when computing block RMS.
pub const RMS_EPSILON: f64 = 1e-12;

/// Marks that end a sentence, including Arabic comma and semicolon.
pub const TERMINAL_PUNCTUATION: &[&str] = &[".", "?", "!", "…", "،", "؛"];

/// Queue poll timeout for the controller loop, in milliseconds.
pub const POLL_TIMEOUT_MS: u64 = 50;

/// Capacity of the capture → controller block queue.
pub const QUEUE_CAPACITY: usize = 1024;

/// Language value that leaves language selection to the decoder.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default decoder model.
pub const DEFAULT_MODEL: &str = "base";

/// Suffix for English-only model variants.
pub const ENGLISH_ONLY_SUFFIX: &str = ".en";

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else {
        "CPU"
    }
}
