//! Decode cadence throttle.

use std::time::{Duration, Instant};

/// Caps decoder calls to one per `interval`, whatever the block arrival rate.
#[derive(Debug, Clone)]
pub struct DecodeThrottle {
    interval: Duration,
    last_decode: Option<Instant>,
}

impl DecodeThrottle {
    /// Creates a throttle that allows the very first decode immediately.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_decode: None,
        }
    }

    /// Returns true if a decode may run at `now`, recording `now` when it may.
    pub fn should_decode(&mut self, now: Instant) -> bool {
        let due = self
            .last_decode
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_decode = Some(now);
        }
        due
    }

    pub fn last_decode(&self) -> Option<Instant> {
        self.last_decode
    }
}
