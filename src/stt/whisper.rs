//! Whisper-based decoder.
//!
//! Implements [`Decoder`] with whisper-rs. Requires the `whisper` feature
//! (and cmake) to build:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::defaults;
use crate::error::{EchogateError, Result};
use crate::stt::decoder::{DecodeOptions, Decoder};
#[cfg(feature = "whisper")]
use crate::stt::decoder::DecodeTask;
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper decoder.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to a ggml Whisper model file
    pub model_path: PathBuf,
    /// Number of threads for inference (None = whisper.cpp default)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(format!("models/ggml-{}.bin", defaults::DEFAULT_MODEL)),
            threads: None,
        }
    }
}

/// Model name from a ggml path: `models/ggml-small.en.bin` → `small.en`.
pub fn model_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    stem.strip_prefix("ggml-").unwrap_or(stem).to_string()
}

/// English-only checkpoints carry the `.en` suffix and take no language bias.
pub fn is_multilingual_model(model_name: &str) -> bool {
    !model_name.ends_with(defaults::ENGLISH_ONLY_SUFFIX)
}

/// Whisper decoder backed by whisper.cpp.
///
/// The context sits behind a Mutex; the controller calls it from one thread.
#[cfg(feature = "whisper")]
pub struct WhisperDecoder {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
    multilingual: bool,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperDecoder")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("multilingual", &self.multilingual)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Placeholder when built without the `whisper` feature.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperDecoder {
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl WhisperDecoder {
    /// Loads the model at `config.model_path`.
    ///
    /// # Errors
    /// `DecoderModelNotFound` if the file does not exist, `DecoderUnavailable`
    /// if whisper.cpp cannot load it.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(EchogateError::DecoderModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config.model_path);
        let multilingual = is_multilingual_model(&model_name);

        let path = config
            .model_path
            .to_str()
            .ok_or_else(|| EchogateError::DecoderUnavailable {
                message: "Invalid UTF-8 in model path".to_string(),
            })?;
        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| EchogateError::DecoderUnavailable {
                message: format!("Failed to load Whisper model: {}", e),
            })?;

        tracing::info!(model = %model_name, multilingual, "whisper model loaded");

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
            multilingual,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperDecoder {
    /// Always fails: this build has no speech recognition.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(EchogateError::DecoderModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }
        Err(EchogateError::DecoderUnavailable {
            message: "built without the `whisper` feature; rebuild with --features whisper"
                .to_string(),
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Decoder for WhisperDecoder {
    fn decode(&self, audio: &[f32], options: &DecodeOptions) -> Result<String> {
        let context = self
            .context
            .lock()
            .map_err(|e| EchogateError::DecodeFailed {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| EchogateError::DecodeFailed {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        // Deterministic greedy decoding keeps successive window decodes comparable
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_temperature(0.0);

        if self.multilingual {
            params.set_language(options.language.as_deref());
            params.set_translate(options.task == DecodeTask::Translate);
        } else {
            params.set_language(None);
            params.set_translate(false);
        }

        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_no_timestamps(true);

        state
            .full(params, audio)
            .map_err(|e| EchogateError::DecodeFailed {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }

        Ok(text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_multilingual(&self) -> bool {
        self.multilingual
    }
}

#[cfg(not(feature = "whisper"))]
impl Decoder for WhisperDecoder {
    fn decode(&self, _audio: &[f32], _options: &DecodeOptions) -> Result<String> {
        Err(EchogateError::DecoderUnavailable {
            message: "built without the `whisper` feature".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_multilingual(&self) -> bool {
        is_multilingual_model(&self.model_name)
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_config_default() {
        let config = WhisperConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/ggml-base.bin"));
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_model_name_strips_ggml_prefix() {
        assert_eq!(
            model_name_from_path(Path::new("/models/ggml-small.en.bin")),
            "small.en"
        );
        assert_eq!(model_name_from_path(Path::new("custom.bin")), "custom");
    }

    #[test]
    fn test_english_only_models_are_not_multilingual() {
        assert!(!is_multilingual_model("small.en"));
        assert!(is_multilingual_model("small"));
        assert!(is_multilingual_model("whisper-small-darija"));
    }

    #[test]
    fn test_missing_model_file_is_reported() {
        let config = WhisperConfig {
            model_path: PathBuf::from("/nonexistent/ggml-tiny.bin"),
            threads: None,
        };
        match WhisperDecoder::new(config) {
            Err(EchogateError::DecoderModelNotFound { path }) => {
                assert!(path.contains("ggml-tiny.bin"))
            }
            other => panic!("expected DecoderModelNotFound, got {:?}", other.map(|_| ())),
        }
    }
}
