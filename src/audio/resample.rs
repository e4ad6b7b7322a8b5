//! Linear-interpolation resampling to the decoder rate.

use std::borrow::Cow;

/// Resamples mono `f32` audio from `from_rate` to `to_rate`.
///
/// Matching rates borrow the input unchanged. Otherwise the output holds
/// `round(len * to_rate / from_rate)` samples, each interpolated between the
/// two nearest input samples using half-sample aligned positions, so the
/// output never leaves the input's value range.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate {
        return Cow::Borrowed(samples);
    }
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Cow::Owned(Vec::new());
    }

    let output_len =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    if output_len == 0 {
        return Cow::Owned(Vec::new());
    }

    let scale = samples.len() as f64 / output_len as f64;
    let last = samples.len() - 1;

    let resampled = (0..output_len)
        .map(|i| {
            let source_pos = ((i as f64 + 0.5) * scale - 0.5).max(0.0);
            let source_idx = (source_pos.floor() as usize).min(last);
            let fraction = source_pos - source_idx as f64;

            if source_idx >= last {
                samples[last]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as f32
            }
        })
        .collect();

    Cow::Owned(resampled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_borrows_input() {
        let samples = vec![0.1f32, 0.2, 0.3];
        let resampled = resample(&samples, 16000, 16000);

        assert!(matches!(resampled, Cow::Borrowed(_)));
        assert_eq!(&*resampled, samples.as_slice());
    }

    #[test]
    fn upsample_8k_to_16k_doubles_length_within_bounds() {
        let samples: Vec<f32> = (0..100).map(|i| ((i as f32) * 0.21).sin() * 0.5).collect();
        let resampled = resample(&samples, 8000, 16000);

        assert_eq!(resampled.len(), 200);

        let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
        let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        for &s in resampled.iter() {
            assert!(!s.is_nan());
            assert!(s >= min - 1e-6 && s <= max + 1e-6, "{} outside [{}, {}]", s, min, max);
        }
    }

    #[test]
    fn upsample_ramp_stays_monotonic() {
        let ramp: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let resampled = resample(&ramp, 8000, 16000);

        for pair in resampled.windows(2) {
            assert!(pair[1] >= pair[0], "ramp must stay non-decreasing: {:?}", pair);
        }
    }

    #[test]
    fn downsample_44100_to_16k_rounds_length() {
        let samples = vec![0.0f32; 4410];
        let resampled = resample(&samples, 44100, 16000);

        // 4410 * 16000 / 44100 = 1600
        assert_eq!(resampled.len(), 1600);
    }

    #[test]
    fn odd_ratio_uses_rounding_not_truncation() {
        // 7 * 16000 / 48000 = 2.33 → 2, 8 * 16000 / 48000 = 2.67 → 3
        assert_eq!(resample(&[0.0; 7], 48000, 16000).len(), 2);
        assert_eq!(resample(&[0.0; 8], 48000, 16000).len(), 3);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(resample(&[], 44100, 16000).is_empty());
        assert!(resample(&[], 16000, 16000).is_empty());
    }

    #[test]
    fn constant_signal_keeps_amplitude() {
        let samples = vec![0.25f32; 480];
        let resampled = resample(&samples, 48000, 16000);

        assert!(resampled.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn single_sample_upsampled_repeats_value() {
        let resampled = resample(&[0.7], 8000, 16000);
        assert_eq!(resampled.len(), 2);
        assert!(resampled.iter().all(|&s| (s - 0.7).abs() < 1e-6));
    }
}
