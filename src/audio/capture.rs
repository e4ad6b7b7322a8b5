//! Microphone capture using CPAL (Cross-Platform Audio Library).
//!
//! The capture callback only copies the device block, downmixes it to mono
//! and hands it to an [`AudioInput`]. Resampling and every piece of
//! controller state stay on the controller thread.

use crate::audio::vad::calculate_rms;
use crate::audio::wav::downmix;
use crate::error::{EchogateError, Result};
use crate::streaming::controller::AudioInput;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Receives the RMS of every captured block, for a live level display.
///
/// Runs on the audio callback thread: it must not block and must not touch
/// UI state directly.
pub type LevelMeter = Box<dyn Fn(f32) + Send + Sync>;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// CPAL probing makes ALSA/JACK print harmless but confusing messages.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for PipeWire/PulseAudio environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful for voice input.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// Lists usable input devices, marking preferred ones with "\[recommended\]".
pub fn list_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().input_devices());
    let devices = devices.map_err(|e| EchogateError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Picks PipeWire/PulseAudio when present, else the host default.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| EchogateError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

fn find_device(name: &str) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let devices =
            cpal::default_host()
                .input_devices()
                .map_err(|e| EchogateError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

        for device in devices {
            if let Ok(device_name) = device.name()
                && device_name == name
            {
                return Ok(device);
            }
        }

        Err(EchogateError::AudioDeviceNotFound {
            device: name.to_string(),
        })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched through the Mutex in `MicrophoneCapture`,
/// one thread at a time.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Live microphone feeding an [`AudioInput`] at the device's native rate.
pub struct MicrophoneCapture {
    device: cpal::Device,
    stream: Arc<Mutex<Option<SendableStream>>>,
    dropped_blocks: Arc<AtomicU64>,
}

impl MicrophoneCapture {
    /// Opens the named input device, or the best default when `None`.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = match device_name {
            Some(name) => find_device(name)?,
            None => get_best_default_device()?,
        };

        Ok(Self {
            device,
            stream: Arc::new(Mutex::new(None)),
            dropped_blocks: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Blocks the controller refused because its queue was full or closed.
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }

    /// Starts streaming captured blocks into `input`.
    ///
    /// Calling `start` on a running capture is a no-op.
    pub fn start(&mut self, input: AudioInput, meter: Option<LevelMeter>) -> Result<()> {
        {
            let guard = self.stream.lock().map_err(|e| EchogateError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })?;
            if guard.is_some() {
                return Ok(());
            }
        }

        let stream = self.build_stream(input, meter)?;
        stream.play().map_err(|e| EchogateError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        let mut guard = self.stream.lock().map_err(|e| EchogateError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        *guard = Some(SendableStream(stream));
        Ok(())
    }

    /// Pauses and releases the stream.
    pub fn stop(&mut self) -> Result<()> {
        let mut guard = self.stream.lock().map_err(|e| EchogateError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(stream) = guard.take() {
            stream.0.pause().map_err(|e| EchogateError::AudioCapture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
        }
        Ok(())
    }

    /// Builds an input stream in the device's native format.
    fn build_stream(&self, input: AudioInput, meter: Option<LevelMeter>) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| EchogateError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        tracing::info!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "opening input stream"
        );

        let err_callback = |err| {
            tracing::error!("audio stream error: {}", err);
        };

        let dropped = Arc::clone(&self.dropped_blocks);
        let forward = move |mono: Vec<f32>| {
            if let Some(ref meter) = meter {
                meter(calculate_rms(&mono));
            }
            if input.push_audio_block(mono, native_rate).is_err() {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        };

        match default_config.sample_format() {
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        forward(downmix(data, native_channels));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| EchogateError::AudioCapture {
                    message: format!("Failed to build f32 input stream: {}", e),
                }),
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        forward(downmix(&floats, native_channels));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| EchogateError::AudioCapture {
                    message: format!("Failed to build i16 input stream: {}", e),
                }),
            fmt => Err(EchogateError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. Try another device with --device.",
                    fmt
                ),
            }),
        }
    }
}
