//! Streaming transcription controller.
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────────────────────────────────┐   ┌──────┐
//! │ capture  │──▶│  bounded  │──▶│ controller thread                      │──▶│ sink │
//! │ callback │   │   queue   │   │  continuous: window ▶ throttle ▶ policy│   │      │
//! └──────────┘   └───────────┘   │  hold-to-talk: accumulate ▶ decode once│   └──────┘
//!                                └────────────────────────────────────────┘
//! ```

pub mod continuous;
pub mod controller;
pub mod hold;
pub mod policy;
pub mod session;
pub mod sink;
pub mod throttle;
pub mod types;

pub use continuous::ContinuousSession;
pub use controller::{
    AudioInput, ControllerConfig, ControllerHandle, Mode, RecordingFlag, StreamingController,
};
pub use hold::HoldSession;
pub use policy::{Decision, Phase, SegmentPolicy, SegmentTracker};
pub use session::Session;
pub use sink::{ChannelSink, CollectorSink, TranscriptSink};
pub use throttle::DecodeThrottle;
pub use types::{AudioBlock, TranscriptEvent};
