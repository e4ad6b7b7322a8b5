//! Data types passed between the capture side, the controller and sinks.

use std::time::Instant;

/// A block of mono samples pushed by the capture collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    /// Mono samples at `sample_rate`.
    pub samples: Vec<f32>,
    /// Rate the samples were captured at.
    pub sample_rate: u32,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioBlock {
    pub fn new(samples: Vec<f32>, sample_rate: u32, sequence: u64) -> Self {
        Self {
            samples,
            sample_rate,
            sequence,
        }
    }

    /// Duration of the block in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Everything a sink can be told, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// New in-progress text.
    Partial(String),
    /// The segment was committed at this instant.
    Finalized(Instant),
    /// Hold-to-talk progress in percent.
    Progress(u8),
    /// A decode failed; the message of the error.
    DecodeError(String),
}

impl TranscriptEvent {
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }
}
