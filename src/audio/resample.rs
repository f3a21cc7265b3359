//! Fit device audio to the recording format.
//!
//! Microphones hand us interleaved frames at whatever rate they like; the
//! artifact is mono at `AudioConfig::sample_rate`.  [`conform`] does both
//! conversions in one pass: each output sample interpolates between the
//! channel averages of the two nearest source frames.

/// Channel average of frame `idx`, or silence past the end.
fn frame_mean(samples: &[f32], channels: usize, idx: usize) -> f32 {
    samples
        .get(idx * channels..(idx + 1) * channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .unwrap_or(0.0)
}

/// Downmix interleaved `samples` to mono and resample from `source_rate` to
/// `target_rate`.
///
/// A trailing partial frame is dropped.  Zero channels yield nothing; a zero
/// rate on either side skips resampling.
///
/// ```rust
/// use sorting_hat::audio::conform;
///
/// // 10 ms of 48 kHz stereo becomes 10 ms of 16 kHz mono.
/// let stereo = vec![0.25_f32; 960];
/// let mono = conform(&stereo, 2, 48_000, 16_000);
/// assert_eq!(mono.len(), 160);
/// ```
pub fn conform(samples: &[f32], channels: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let channels = channels as usize;
    if channels == 0 {
        return Vec::new();
    }
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }

    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return (0..frames).map(|i| frame_mean(samples, channels, i)).collect();
    }

    let step = source_rate as f64 / target_rate as f64;
    let out_len = (frames as f64 / step).ceil() as usize;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let t = (pos - idx as f64) as f32;
            let a = frame_mean(samples, channels, idx);
            if idx + 1 < frames {
                a + (frame_mean(samples, channels, idx + 1) - a) * t
            } else {
                a
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_at_target_rate_passes_through() {
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        assert_eq!(conform(&input, 1, 44_100, 44_100), input);
    }

    #[test]
    fn stereo_is_averaged() {
        let out = conform(&[1.0, -1.0, 0.4, 0.6], 2, 16_000, 16_000);
        assert_eq!(out.len(), 2);
        assert!(out[0].abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn partial_frame_and_no_channels() {
        assert_eq!(conform(&[0.2, 0.2, 0.9], 2, 8_000, 8_000), vec![0.2]);
        assert!(conform(&[0.5; 8], 0, 8_000, 8_000).is_empty());
        assert!(conform(&[], 1, 48_000, 44_100).is_empty());
    }

    #[test]
    fn one_second_keeps_its_duration() {
        let out = conform(&vec![0.0; 2 * 48_000], 2, 48_000, 44_100);
        assert!(out.len().abs_diff(44_100) <= 1, "got {}", out.len());
    }

    #[test]
    fn upsampling_interpolates_between_frames() {
        let out = conform(&[0.0, 1.0], 1, 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn level_survives_rate_change() {
        for s in conform(&vec![-0.3; 3 * 480], 3, 48_000, 44_100) {
            assert!((s + 0.3).abs() < 1e-5, "drift: {s}");
        }
    }
}
