//! Audio primitives: resampling, the rolling window, voice gating and I/O.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod resample;
pub mod vad;
pub mod wav;
pub mod window;

pub use resample::resample;
pub use vad::{Clock, MockClock, SystemClock, VoiceActivity, VoiceGate, VoiceGateConfig};
pub use wav::WavClip;
pub use window::RollingWindow;
