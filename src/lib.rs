//! echogate - streaming speech transcription controller
//!
//! Turns a live microphone stream into live partial text and finalized
//! segments by re-decoding a rolling window, or decodes a whole utterance
//! once in hold-to-talk mode.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
#[cfg(feature = "cli")]
pub mod console;
pub mod defaults;
pub mod error;
pub mod streaming;
pub mod stt;

// Seams: decoder in, sink out
pub use streaming::sink::{ChannelSink, CollectorSink, TranscriptSink};
pub use stt::decoder::{DecodeOptions, DecodeTask, Decoder, MockDecoder};

// Controller
pub use streaming::controller::{
    AudioInput, ControllerConfig, ControllerHandle, Mode, RecordingFlag, StreamingController,
};
pub use streaming::types::TranscriptEvent;

// Error handling
pub use error::{EchogateError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
