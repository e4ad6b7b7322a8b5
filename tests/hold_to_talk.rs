//! Hold-to-talk: one decode per release, driven directly and through the
//! controller thread.

use echogate::streaming::hold::progress;
use echogate::streaming::{
    CollectorSink, ControllerConfig, HoldSession, Mode, RecordingFlag, Session,
    StreamingController, TranscriptEvent,
};
use echogate::stt::{DecodeTask, MockDecoder, MockResponse};
use std::sync::Arc;
use std::time::Instant;

fn hold_config() -> ControllerConfig {
    ControllerConfig::default().with_mode(Mode::HoldToTalk)
}

#[test]
fn release_without_audio_only_finalizes() {
    let decoder = MockDecoder::new("m").with_response("should not appear");
    let probe = decoder.clone();
    let mut session = HoldSession::new(&hold_config(), Arc::new(decoder));
    let mut sink = CollectorSink::new();

    let released = Instant::now();
    session.finish(released, &mut sink);

    assert_eq!(sink.events(), vec![TranscriptEvent::Finalized(released)]);
    assert_eq!(probe.calls(), 0);
}

#[test]
fn release_reports_progress_in_order() {
    let decoder = MockDecoder::new("m").with_response("  open the door  ");
    let mut session = HoldSession::new(&hold_config(), Arc::new(decoder));
    let mut sink = CollectorSink::new();
    let now = Instant::now();

    for _ in 0..5 {
        session.ingest(&[0.05; 4800], 48000, now, &mut sink);
    }
    assert!(sink.events().is_empty(), "nothing is shown while held");

    session.finish(now, &mut sink);

    assert_eq!(
        sink.events(),
        vec![
            TranscriptEvent::Progress(progress::CAPTURED),
            TranscriptEvent::Progress(progress::PREPARED),
            TranscriptEvent::Progress(progress::DECODED),
            TranscriptEvent::Partial("open the door".to_string()),
            TranscriptEvent::Progress(progress::DONE),
            TranscriptEvent::Finalized(now),
        ]
    );
}

#[test]
fn failed_decode_is_reported_and_segment_still_closes() {
    let decoder = MockDecoder::new("m").with_failure();
    let mut session = HoldSession::new(&hold_config(), Arc::new(decoder));
    let mut sink = CollectorSink::new();
    let now = Instant::now();

    session.ingest(&[0.05; 1600], 16000, now, &mut sink);
    session.finish(now, &mut sink);

    assert!(sink.partials().is_empty());
    assert_eq!(sink.decode_errors(), 1);
    assert_eq!(sink.progress(), vec![progress::CAPTURED, progress::PREPARED, progress::DONE]);
    assert_eq!(sink.finalizations(), vec![now]);
}

#[test]
fn each_release_is_independent() {
    let decoder = MockDecoder::new("m").with_responses(vec![
        MockResponse::Text("first".to_string()),
        MockResponse::Text("second".to_string()),
    ]);
    let probe = decoder.clone();
    let mut session = HoldSession::new(&hold_config(), Arc::new(decoder));
    let mut sink = CollectorSink::new();
    let now = Instant::now();

    session.ingest(&[0.05; 16000], 16000, now, &mut sink);
    session.finish(now, &mut sink);
    session.ingest(&[0.05; 8000], 16000, now, &mut sink);
    session.finish(now, &mut sink);

    assert_eq!(sink.partials(), vec!["first", "second"]);
    assert_eq!(sink.finalizations().len(), 2);
    assert_eq!(probe.last_audio_len(), 8000);
}

#[test]
fn threaded_hold_decodes_every_queued_block_on_release() {
    let decoder = MockDecoder::new("multi").with_response("turn on the lights");
    let probe = decoder.clone();
    let config = ControllerConfig {
        language: "ar".to_string(),
        task: DecodeTask::Translate,
        ..hold_config()
    };
    let controller = StreamingController::new(config, Arc::new(decoder), RecordingFlag::new());
    let sink = CollectorSink::new();

    let handle = controller.start(Box::new(sink.clone())).unwrap();
    assert!(controller.flag().is_recording());

    // One second at 48 kHz in ten blocks
    for _ in 0..10 {
        handle.push_audio_block(vec![0.05f32; 4800], 48000).unwrap();
    }
    handle.stop().unwrap();

    assert!(!controller.flag().is_recording());
    assert_eq!(probe.calls(), 1);
    assert_eq!(probe.last_audio_len(), 16000);

    let options = probe.last_options().unwrap();
    assert_eq!(options.language.as_deref(), Some("ar"));
    assert_eq!(options.task, DecodeTask::Translate);

    assert_eq!(sink.partials(), vec!["turn on the lights"]);
    assert_eq!(sink.finalizations().len(), 1);
    assert_eq!(sink.progress().last(), Some(&progress::DONE));
}

#[test]
fn threaded_hold_with_no_audio_finalizes_once() {
    let decoder = MockDecoder::new("m");
    let probe = decoder.clone();
    let controller =
        StreamingController::new(hold_config(), Arc::new(decoder), RecordingFlag::new());
    let sink = CollectorSink::new();

    let handle = controller.start(Box::new(sink.clone())).unwrap();
    handle.stop().unwrap();

    assert_eq!(probe.calls(), 0);
    assert!(sink.partials().is_empty());
    assert_eq!(sink.finalizations().len(), 1);
}
