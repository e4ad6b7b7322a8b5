//! Fixed-length rolling window over the most recent audio.

use std::time::Duration;

/// Rolling buffer holding exactly `window` seconds of audio at the target rate.
///
/// New samples shift the contents left and land at the end, so
/// [`as_slice`](Self::as_slice) is always in chronological order and its
/// length never changes. Starts out as silence.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl RollingWindow {
    /// Creates a zero-filled window of `window` duration at `sample_rate`.
    pub fn new(window: Duration, sample_rate: u32) -> Self {
        let len = (window.as_secs_f64() * sample_rate as f64).round() as usize;
        Self {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    /// Appends `block`, discarding the oldest samples.
    ///
    /// A block longer than the window keeps only its most recent samples.
    pub fn push(&mut self, block: &[f32]) {
        let len = self.samples.len();
        let n = block.len().min(len);
        if n == 0 {
            return;
        }

        self.samples.copy_within(n.., 0);
        self.samples[len - n..].copy_from_slice(&block[block.len() - n..]);
    }

    /// Window contents, oldest sample first.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Number of samples in the window. Constant for the window's lifetime.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True for a zero-length window.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Overwrites the whole window with silence.
    pub fn silence(&mut self) {
        self.samples.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(len_secs: f64, rate: u32) -> RollingWindow {
        RollingWindow::new(Duration::from_secs_f64(len_secs), rate)
    }

    #[test]
    fn new_window_is_silent_with_exact_length() {
        let window = window_of(8.0, 16000);
        assert_eq!(window.len(), 128_000);
        assert!(window.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn push_appends_at_the_end() {
        let mut window = window_of(0.001, 5000); // 5 samples
        window.push(&[1.0, 2.0]);
        assert_eq!(window.as_slice(), &[0.0, 0.0, 0.0, 1.0, 2.0]);

        window.push(&[3.0]);
        assert_eq!(window.as_slice(), &[0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn oversized_block_keeps_its_tail() {
        let mut window = window_of(0.001, 3000); // 3 samples
        window.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window.as_slice(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn length_is_invariant_over_many_pushes() {
        let mut window = window_of(0.01, 16000); // 160 samples
        let mut counter = 0.0f32;
        for block_len in [0usize, 1, 7, 159, 160, 161, 500, 3] {
            let block: Vec<f32> = (0..block_len)
                .map(|_| {
                    counter += 1.0;
                    counter
                })
                .collect();
            window.push(&block);

            assert_eq!(window.len(), 160);
            let n = block.len().min(window.len());
            assert_eq!(
                &window.as_slice()[window.len() - n..],
                &block[block.len() - n..]
            );
        }
    }

    #[test]
    fn contents_stay_chronological() {
        let mut window = window_of(0.001, 4000); // 4 samples
        for i in 0..10 {
            window.push(&[i as f32]);
        }
        assert_eq!(window.as_slice(), &[6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn silence_zeroes_without_resizing() {
        let mut window = window_of(0.001, 4000);
        window.push(&[1.0, 1.0, 1.0, 1.0]);
        window.silence();
        assert_eq!(window.as_slice(), &[0.0; 4]);
        assert_eq!(window.len(), 4);
    }
}
