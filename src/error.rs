//! Error types for echogate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EchogateError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Invalid WAV input: {message}")]
    WavFormat { message: String },

    // Decoder errors
    #[error("Decoder model not found at {path}")]
    DecoderModelNotFound { path: String },

    #[error("Decoding failed: {message}")]
    DecodeFailed { message: String },

    #[error("Decoder unavailable: {message}")]
    DecoderUnavailable { message: String },

    // Controller errors
    #[error("Audio queue full, dropped block of {samples} samples")]
    QueueFull { samples: usize },

    #[error("Controller stopped, audio block rejected")]
    ControllerStopped,

    #[error("Controller thread failed: {message}")]
    ControllerThread { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EchogateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = EchogateError::ConfigInvalidValue {
            key: "streaming.window_secs".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for streaming.window_secs: must be positive"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = EchogateError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_decode_failed_display() {
        let error = EchogateError::DecodeFailed {
            message: "out of memory".to_string(),
        };
        assert_eq!(error.to_string(), "Decoding failed: out of memory");
    }

    #[test]
    fn test_queue_full_display() {
        let error = EchogateError::QueueFull { samples: 4410 };
        assert_eq!(
            error.to_string(),
            "Audio queue full, dropped block of 4410 samples"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: EchogateError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<EchogateError>();
        assert_sync::<EchogateError>();
    }
}
