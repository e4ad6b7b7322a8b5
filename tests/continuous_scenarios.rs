//! End-to-end timing scenarios for continuous mode, driven on a synthetic
//! clock: 100 ms blocks, each ingested at the instant its last sample arrives.

use echogate::audio::resample::resample;
use echogate::streaming::{
    CollectorSink, ContinuousSession, ControllerConfig, Phase, Session, TranscriptEvent,
};
use echogate::stt::{DecodeOptions, Decoder, MockDecoder};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RATE: u32 = 16000;
const BLOCK: usize = 1600;
const BLOCK_TIME: Duration = Duration::from_millis(100);

/// Answers like a model that only punctuates once the speaker has paused.
///
/// Silent window: nothing. Energy in the last 0.4 s: "hello". Energy only
/// further back: "hello.".
struct PausePunctuator;

impl Decoder for PausePunctuator {
    fn decode(&self, audio: &[f32], _options: &DecodeOptions) -> echogate::Result<String> {
        let loud = |s: &[f32]| s.iter().any(|x| x.abs() > 0.01);
        let recent = &audio[audio.len().saturating_sub(RATE as usize * 4 / 10)..];
        let text = if loud(recent) {
            "hello"
        } else if loud(audio) {
            "hello."
        } else {
            ""
        };
        Ok(text.to_string())
    }

    fn model_name(&self) -> &str {
        "pause-punctuator"
    }

    fn is_multilingual(&self) -> bool {
        false
    }
}

fn speech_block() -> Vec<f32> {
    (0..BLOCK)
        .map(|i| if (i / 20) % 2 == 0 { 0.1 } else { -0.1 })
        .collect()
}

fn silence_block() -> Vec<f32> {
    vec![0.0; BLOCK]
}

/// Drives a session block by block on a synthetic clock.
struct Driver {
    session: ContinuousSession,
    sink: CollectorSink,
    start: Instant,
    now: Instant,
}

impl Driver {
    fn new(decoder: Arc<dyn Decoder>) -> Self {
        let start = Instant::now();
        Self {
            session: ContinuousSession::new(&ControllerConfig::default(), decoder, start),
            sink: CollectorSink::new(),
            start,
            now: start,
        }
    }

    fn feed(&mut self, block: &[f32], count: usize) {
        for _ in 0..count {
            self.now += BLOCK_TIME;
            self.session.ingest(block, RATE, self.now, &mut self.sink);
        }
    }

    fn at(&self, millis: u64) -> Instant {
        self.start + Duration::from_millis(millis)
    }
}

#[test]
fn speech_then_pause_yields_live_partial_and_one_finalize() {
    let mut driver = Driver::new(Arc::new(PausePunctuator));

    driver.feed(&silence_block(), 80);
    assert!(driver.sink.events().is_empty(), "silence must stay quiet");

    driver.feed(&speech_block(), 20);
    assert_eq!(driver.sink.partials(), vec!["hello"]);
    assert!(driver.sink.finalizations().is_empty());

    driver.feed(&silence_block(), 10);

    assert_eq!(driver.sink.partials(), vec!["hello", "hello."]);
    let finals = driver.sink.finalizations();
    assert_eq!(finals.len(), 1);

    let speech_end = driver.at(10_000);
    let trailing = finals[0].duration_since(speech_end);
    assert!(
        trailing >= Duration::from_millis(300) && trailing <= Duration::from_millis(1100),
        "finalized {:?} after speech ended",
        trailing
    );
    assert_eq!(driver.sink.last_finalized_text().as_deref(), Some("hello."));
}

#[test]
fn finalized_audio_is_not_decoded_again() {
    let mut driver = Driver::new(Arc::new(PausePunctuator));
    driver.feed(&speech_block(), 10);
    driver.feed(&silence_block(), 40);

    assert_eq!(driver.sink.finalizations().len(), 1);
    assert!(driver.session.window().as_slice().iter().all(|&s| s == 0.0));
    assert!(matches!(driver.session.segment().phase(), Phase::Locked { .. }));
}

#[test]
fn unpunctuated_text_finalizes_once_after_silence_rule() {
    let decoder = MockDecoder::new("steady").with_response("turn left here");
    let probe = decoder.clone();
    let mut driver = Driver::new(Arc::new(decoder));

    driver.feed(&speech_block(), 10);
    driver.feed(&silence_block(), 30);

    assert_eq!(driver.sink.partials(), vec!["turn left here"]);
    let finals = driver.sink.finalizations();
    assert_eq!(finals.len(), 1);

    // Needs 0.8 s of silence; decodes land every 0.5 s.
    let trailing = finals[0].duration_since(driver.at(1_000));
    assert!(trailing >= Duration::from_millis(800));
    assert!(trailing <= Duration::from_millis(1300));

    // Locked with no new speech: the decoder is left alone.
    let calls = probe.calls();
    driver.feed(&silence_block(), 30);
    assert_eq!(probe.calls(), calls);
    assert_eq!(driver.sink.finalizations().len(), 1);
}

#[test]
fn new_speech_opens_a_second_segment() {
    let decoder = MockDecoder::new("steady").with_response("hello there.");
    let mut driver = Driver::new(Arc::new(decoder));

    driver.feed(&speech_block(), 10);
    driver.feed(&silence_block(), 10);
    assert_eq!(driver.sink.finalizations().len(), 1);

    driver.feed(&speech_block(), 10);
    driver.feed(&silence_block(), 15);

    assert_eq!(driver.sink.partials(), vec!["hello there.", "hello there."]);
    let finals = driver.sink.finalizations();
    assert_eq!(finals.len(), 2);
    assert!(finals[0] < finals[1]);

    // Each finalize follows its own partial.
    let kinds: Vec<bool> = driver
        .sink
        .events()
        .iter()
        .map(TranscriptEvent::is_partial)
        .collect();
    assert_eq!(kinds, vec![true, false, true, false]);
}

#[test]
fn decodes_are_throttled_to_the_configured_interval() {
    let decoder = MockDecoder::new("counter").with_response("");
    let probe = decoder.clone();
    let start = Instant::now();
    let mut session =
        ContinuousSession::new(&ControllerConfig::default(), Arc::new(decoder), start);
    let mut sink = CollectorSink::new();

    // 30 ms blocks for 3 s
    let block = vec![0.0f32; 480];
    for i in 1..=100u64 {
        session.ingest(&block, RATE, start + Duration::from_millis(30 * i), &mut sink);
    }

    assert_eq!(probe.calls(), 6);
    assert_eq!(session.decodes(), 6);
}

#[test]
fn window_length_is_constant_across_rates_and_block_sizes() {
    let decoder = MockDecoder::new("m").with_response("");
    let start = Instant::now();
    let mut session =
        ContinuousSession::new(&ControllerConfig::default(), Arc::new(decoder), start);
    let mut sink = CollectorSink::new();
    let expected_len = 8 * RATE as usize;

    let feeds: [(usize, u32); 5] = [(480, 48000), (441, 44100), (1600, 16000), (3, 8000), (0, 48000)];
    let mut now = start;
    for (n, (len, rate)) in feeds.into_iter().enumerate() {
        let block: Vec<f32> = (0..len).map(|i| ((i + n) % 7) as f32 * 0.01).collect();
        now += Duration::from_millis(10);
        session.ingest(&block, rate, now, &mut sink);

        let window = session.window().as_slice();
        assert_eq!(window.len(), expected_len);

        let resampled = resample(&block, rate, RATE);
        let tail = &window[window.len() - resampled.len()..];
        assert_eq!(tail, &resampled[..]);
    }
}

#[test]
fn upsampling_doubles_length_within_input_range() {
    let input: Vec<f32> = (0..100).map(|i| ((i as f32) * 0.3).sin() * 0.5).collect();
    let output = resample(&input, 8000, 16000);

    assert_eq!(output.len(), 200);
    let min = input.iter().copied().fold(f32::INFINITY, f32::min);
    let max = input.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    for &s in output.iter() {
        assert!(s.is_finite());
        assert!(s >= min - 1e-6 && s <= max + 1e-6, "{} outside [{}, {}]", s, min, max);
    }
}

#[test]
fn finish_commits_text_that_was_never_finalized() {
    let mut driver = Driver::new(Arc::new(PausePunctuator));
    driver.feed(&speech_block(), 5);
    assert_eq!(driver.sink.partials(), vec!["hello"]);

    let end = driver.now;
    driver.session.finish(end, &mut driver.sink);

    assert_eq!(driver.sink.finalizations(), vec![end]);
    assert_eq!(driver.sink.last_finalized_text().as_deref(), Some("hello"));
}
