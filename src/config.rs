use crate::audio::vad::VoiceGateConfig;
use crate::defaults;
use crate::error::{EchogateError, Result};
use crate::stt::decoder::DecodeTask;
use crate::streaming::controller::{ControllerConfig, Mode};
use crate::streaming::policy::SegmentPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub streaming: StreamingConfig,
    pub decoder: DecoderConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub target_sample_rate: u32,
    pub gate_threshold: f32,
}

/// Controller timing and policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    pub mode: Mode,
    pub window_secs: f64,
    pub decode_every_secs: f64,
    pub finalize_silence_secs: f64,
    pub stable_min_secs: f64,
    pub punctuation_grace_secs: f64,
    pub hangover_secs: f64,
    pub min_emit_chars_silent: usize,
    pub terminal_punctuation: Vec<String>,
    pub poll_timeout_ms: u64,
    pub queue_capacity: usize,
}

/// Speech decoder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    /// Model name (`base`, `small.en`, ...) or path to a ggml file.
    pub model: String,
    /// `auto` or a language code such as `en` or `ar`.
    pub language: String,
    pub task: DecodeTask,
    pub threads: Option<usize>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            target_sample_rate: defaults::TARGET_SAMPLE_RATE,
            gate_threshold: defaults::GATE_THRESHOLD,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            window_secs: defaults::WINDOW_SECS,
            decode_every_secs: defaults::DECODE_EVERY_SECS,
            finalize_silence_secs: defaults::FINALIZE_SILENCE_SECS,
            stable_min_secs: defaults::STABLE_MIN_SECS,
            punctuation_grace_secs: defaults::PUNCTUATION_GRACE_SECS,
            hangover_secs: defaults::HANGOVER_SECS,
            min_emit_chars_silent: defaults::MIN_EMIT_CHARS_SILENT,
            terminal_punctuation: defaults::TERMINAL_PUNCTUATION
                .iter()
                .map(|p| p.to_string())
                .collect(),
            poll_timeout_ms: defaults::POLL_TIMEOUT_MS,
            queue_capacity: defaults::QUEUE_CAPACITY,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::AUTO_LANGUAGE.to_string(),
            task: DecodeTask::default(),
            threads: None,
        }
    }
}

impl DecoderConfig {
    /// Resolves `model` to a file: paths are used as given, bare names map
    /// to `ggml-<name>.bin` in the model directory.
    pub fn model_path(&self) -> PathBuf {
        let model = Path::new(&self.model);
        if model.extension().is_some_and(|ext| ext == "bin") || model.components().count() > 1 {
            return model.to_path_buf();
        }
        Config::model_dir().join(format!("ggml-{}.bin", self.model))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ECHOGATE_MODEL → decoder.model
    /// - ECHOGATE_LANGUAGE → decoder.language
    /// - ECHOGATE_AUDIO_DEVICE → audio.device
    /// - ECHOGATE_MODE → streaming.mode (`continuous` or `hold-to-talk`)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("ECHOGATE_MODEL")
            && !model.is_empty()
        {
            self.decoder.model = model;
        }

        if let Ok(language) = std::env::var("ECHOGATE_LANGUAGE")
            && !language.is_empty()
        {
            self.decoder.language = language;
        }

        if let Ok(device) = std::env::var("ECHOGATE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(mode) = std::env::var("ECHOGATE_MODE") {
            match mode.as_str() {
                "" => {}
                "continuous" => self.streaming.mode = Mode::Continuous,
                "hold-to-talk" => self.streaming.mode = Mode::HoldToTalk,
                other => tracing::warn!("ignoring unknown ECHOGATE_MODE '{}'", other),
            }
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/echogate/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("echogate")
            .join("config.toml")
    }

    /// Directory bare model names are resolved against.
    ///
    /// Returns ~/.local/share/echogate/models on Linux
    pub fn model_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("echogate")
            .join("models")
    }

    /// Checks every value the controller relies on.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> EchogateError {
            EchogateError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.audio.target_sample_rate == 0 {
            return Err(invalid("audio.target_sample_rate", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.audio.gate_threshold) {
            return Err(invalid("audio.gate_threshold", "must be between 0.0 and 1.0"));
        }

        let s = &self.streaming;
        for (key, value) in [
            ("streaming.window_secs", s.window_secs),
            ("streaming.decode_every_secs", s.decode_every_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(key, "must be a positive number of seconds"));
            }
        }
        for (key, value) in [
            ("streaming.finalize_silence_secs", s.finalize_silence_secs),
            ("streaming.stable_min_secs", s.stable_min_secs),
            ("streaming.punctuation_grace_secs", s.punctuation_grace_secs),
            ("streaming.hangover_secs", s.hangover_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(key, "must be zero or a positive number of seconds"));
            }
        }
        if s.terminal_punctuation.iter().all(|p| p.is_empty()) {
            return Err(invalid(
                "streaming.terminal_punctuation",
                "must contain at least one mark",
            ));
        }
        if s.poll_timeout_ms == 0 {
            return Err(invalid("streaming.poll_timeout_ms", "must be positive"));
        }
        if s.queue_capacity == 0 {
            return Err(invalid("streaming.queue_capacity", "must be positive"));
        }

        if self.decoder.model.trim().is_empty() {
            return Err(invalid("decoder.model", "must not be empty"));
        }
        if self.decoder.threads == Some(0) {
            return Err(invalid("decoder.threads", "must be positive when set"));
        }

        Ok(())
    }

    /// Validates and converts to the runtime controller configuration.
    pub fn controller_config(&self) -> Result<ControllerConfig> {
        self.validate()?;
        let s = &self.streaming;

        Ok(ControllerConfig {
            mode: s.mode,
            target_sample_rate: self.audio.target_sample_rate,
            window: Duration::from_secs_f64(s.window_secs),
            decode_every: Duration::from_secs_f64(s.decode_every_secs),
            gate: VoiceGateConfig {
                threshold: self.audio.gate_threshold,
                hangover: Duration::from_secs_f64(s.hangover_secs),
            },
            policy: SegmentPolicy {
                finalize_silence: Duration::from_secs_f64(s.finalize_silence_secs),
                stable_min: Duration::from_secs_f64(s.stable_min_secs),
                punctuation_grace: Duration::from_secs_f64(s.punctuation_grace_secs),
                min_emit_chars_silent: s.min_emit_chars_silent,
                terminal_punctuation: s
                    .terminal_punctuation
                    .iter()
                    .filter(|p| !p.is_empty())
                    .cloned()
                    .collect(),
            },
            language: self.decoder.language.clone(),
            task: self.decoder.task,
            poll_timeout: Duration::from_millis(s.poll_timeout_ms),
            queue_capacity: s.queue_capacity,
        })
    }
}
