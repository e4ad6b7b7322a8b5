//! WAV file loading for replaying recordings through the controller.

use crate::error::{EchogateError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Mono float audio loaded from a WAV file at its native rate.
///
/// Resampling is left to the controller, exactly as for live capture.
#[derive(Debug, Clone)]
pub struct WavClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl WavClip {
    /// Opens and decodes a WAV file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Decodes WAV data from any reader, downmixing to mono.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| EchogateError::WavFormat {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.channels == 0 {
            return Err(EchogateError::WavFormat {
                message: "WAV header declares zero channels".to_string(),
            });
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>(),
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                wav_reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
        }
        .map_err(|e| EchogateError::WavFormat {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

        Ok(Self {
            samples: downmix(&interleaved, spec.channels as usize),
            sample_rate: spec.sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration of the clip in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Splits the clip into consecutive blocks of `block_ms` milliseconds,
    /// the way a capture device would deliver it. The last block may be short.
    pub fn blocks(&self, block_ms: u32) -> impl Iterator<Item = &[f32]> {
        let block_len = ((self.sample_rate as u64 * block_ms as u64) / 1000).max(1) as usize;
        self.samples.chunks(block_len)
    }
}

/// Averages interleaved frames down to one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
