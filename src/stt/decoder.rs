//! The `Decoder` trait, per-call decode options and a scriptable mock.

use crate::defaults;
use crate::error::{EchogateError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the decoder should produce from the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DecodeTask {
    /// Text in the spoken language.
    #[default]
    Transcribe,
    /// English translation of the speech.
    Translate,
}

/// Language and task bias handed to the decoder on every call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    /// Forced language code, or `None` to let the decoder decide.
    pub language: Option<String>,
    pub task: DecodeTask,
}

impl DecodeOptions {
    /// Resolves the bias for a decoder.
    ///
    /// Multilingual models get the requested language (unless it is `auto`)
    /// and task. Single-language models get no bias at all, so a forced
    /// language left over from another model never leaks into them.
    pub fn for_decoder(multilingual: bool, requested_language: &str, task: DecodeTask) -> Self {
        if !multilingual {
            return Self::default();
        }

        let language = match requested_language.trim() {
            "" => None,
            code if code.eq_ignore_ascii_case(defaults::AUTO_LANGUAGE) => None,
            code => Some(code.to_lowercase()),
        };

        Self { language, task }
    }

    /// True when a language or a non-default task is forced.
    pub fn is_biased(&self) -> bool {
        self.language.is_some() || self.task != DecodeTask::Transcribe
    }
}

/// Speech decoder consumed by the streaming controller.
///
/// Receives mono `f32` audio at the target rate (16 kHz by default) and
/// returns the transcript. Calls are synchronous and may take hundreds of
/// milliseconds; the controller never issues two at once. Audio is never
/// padded, so implementations that build an encoder attention mask use all
/// ones sized to the real feature length.
pub trait Decoder: Send + Sync {
    /// Decodes `audio` into text.
    fn decode(&self, audio: &[f32], options: &DecodeOptions) -> Result<String>;

    /// Name of the loaded model.
    fn model_name(&self) -> &str;

    /// Whether the model accepts a language / task bias.
    fn is_multilingual(&self) -> bool;

    /// Whether the decoder can serve requests.
    fn is_ready(&self) -> bool {
        true
    }
}

impl<T: Decoder + ?Sized> Decoder for Arc<T> {
    fn decode(&self, audio: &[f32], options: &DecodeOptions) -> Result<String> {
        (**self).decode(audio, options)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_multilingual(&self) -> bool {
        (**self).is_multilingual()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// One scripted reply of a [`MockDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    Text(String),
    Fail(String),
}

/// Mock decoder for testing.
///
/// Replies follow a script, one entry per call, repeating the last entry
/// once the script runs out. Clones share the call log, so a test can keep a
/// clone as a probe after handing the decoder to a controller.
#[derive(Debug, Clone)]
pub struct MockDecoder {
    model_name: String,
    multilingual: bool,
    script: Vec<MockResponse>,
    calls: Arc<AtomicUsize>,
    last_options: Arc<Mutex<Option<DecodeOptions>>>,
    last_audio_len: Arc<AtomicUsize>,
}

impl MockDecoder {
    /// Creates a mock that always answers "mock transcription".
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            multilingual: true,
            script: vec![MockResponse::Text("mock transcription".to_string())],
            calls: Arc::new(AtomicUsize::new(0)),
            last_options: Arc::new(Mutex::new(None)),
            last_audio_len: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answer `response`.
    pub fn with_response(mut self, response: &str) -> Self {
        self.script = vec![MockResponse::Text(response.to_string())];
        self
    }

    /// Answer each call with the next entry of `responses`.
    pub fn with_script<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script = responses
            .into_iter()
            .map(|r| MockResponse::Text(r.into()))
            .collect();
        self
    }

    /// Use fully specified replies, failures included.
    pub fn with_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.script = responses;
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        self.script = vec![MockResponse::Fail("mock decode failure".to_string())];
        self
    }

    /// Mark the mock as a single-language model.
    pub fn single_language(mut self) -> Self {
        self.multilingual = false;
        self
    }

    /// Number of decode calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options passed on the most recent call.
    pub fn last_options(&self) -> Option<DecodeOptions> {
        self.last_options.lock().ok().and_then(|o| o.clone())
    }

    /// Number of samples passed on the most recent call.
    pub fn last_audio_len(&self) -> usize {
        self.last_audio_len.load(Ordering::SeqCst)
    }
}

impl Decoder for MockDecoder {
    fn decode(&self, audio: &[f32], options: &DecodeOptions) -> Result<String> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_audio_len.store(audio.len(), Ordering::SeqCst);
        if let Ok(mut last) = self.last_options.lock() {
            *last = Some(options.clone());
        }

        let reply = self
            .script
            .get(index)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or(MockResponse::Text(String::new()));

        match reply {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Fail(message) => Err(EchogateError::DecodeFailed { message }),
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_multilingual(&self) -> bool {
        self.multilingual
    }

    fn is_ready(&self) -> bool {
        !self
            .script
            .iter()
            .all(|r| matches!(r, MockResponse::Fail(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_decoder_returns_response() {
        let decoder = MockDecoder::new("test-model").with_response("hello there");
        let result = decoder.decode(&[0.0; 1000], &DecodeOptions::default());
        assert_eq!(result.unwrap(), "hello there");
    }

    #[test]
    fn test_mock_decoder_follows_script_then_repeats_last() {
        let decoder = MockDecoder::new("m").with_script(["", "hel", "hello"]);
        let options = DecodeOptions::default();

        let replies: Vec<String> = (0..5)
            .map(|_| decoder.decode(&[], &options).unwrap())
            .collect();
        assert_eq!(replies, vec!["", "hel", "hello", "hello", "hello"]);
        assert_eq!(decoder.calls(), 5);
    }

    #[test]
    fn test_mock_decoder_failure() {
        let decoder = MockDecoder::new("m").with_failure();
        match decoder.decode(&[0.0; 10], &DecodeOptions::default()) {
            Err(EchogateError::DecodeFailed { message }) => {
                assert_eq!(message, "mock decode failure")
            }
            other => panic!("expected DecodeFailed, got {:?}", other),
        }
        assert!(!decoder.is_ready());
    }

    #[test]
    fn test_mock_decoder_clones_share_call_log() {
        let decoder = MockDecoder::new("m");
        let probe = decoder.clone();
        let shared: Arc<dyn Decoder> = Arc::new(decoder);

        let options = DecodeOptions::for_decoder(true, "ar", DecodeTask::Transcribe);
        shared.decode(&[0.0; 320], &options).unwrap();

        assert_eq!(probe.calls(), 1);
        assert_eq!(probe.last_audio_len(), 320);
        assert_eq!(probe.last_options(), Some(options));
    }

    #[test]
    fn test_decoder_trait_is_object_safe() {
        let decoder: Box<dyn Decoder> = Box::new(MockDecoder::new("boxed").with_response("ok"));
        assert_eq!(decoder.model_name(), "boxed");
        assert!(decoder.is_ready());
        assert_eq!(decoder.decode(&[], &DecodeOptions::default()).unwrap(), "ok");
    }

    #[test]
    fn test_options_for_multilingual_with_language() {
        let options = DecodeOptions::for_decoder(true, "AR", DecodeTask::Transcribe);
        assert_eq!(options.language.as_deref(), Some("ar"));
        assert!(options.is_biased());
    }

    #[test]
    fn test_options_for_multilingual_auto() {
        let options = DecodeOptions::for_decoder(true, "auto", DecodeTask::Transcribe);
        assert_eq!(options, DecodeOptions::default());
        assert!(!options.is_biased());
    }

    #[test]
    fn test_options_keep_translate_task() {
        let options = DecodeOptions::for_decoder(true, "auto", DecodeTask::Translate);
        assert_eq!(options.language, None);
        assert_eq!(options.task, DecodeTask::Translate);
    }

    #[test]
    fn test_options_cleared_for_single_language_model() {
        let options = DecodeOptions::for_decoder(false, "ar", DecodeTask::Translate);
        assert_eq!(options, DecodeOptions::default());
    }

    #[test]
    fn test_decode_task_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            task: DecodeTask,
        }
        let parsed: Wrapper = toml::from_str("task = \"translate\"").unwrap();
        assert_eq!(parsed.task, DecodeTask::Translate);
    }
}
