//! Speech decoding boundary.

pub mod decoder;
pub mod whisper;

pub use decoder::{DecodeOptions, DecodeTask, Decoder, MockDecoder, MockResponse};
pub use whisper::{WhisperConfig, WhisperDecoder};
