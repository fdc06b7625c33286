//! Fixed-rate linear resampler.
//!
//! The recognizer consumes **16 kHz mono `f32`** audio while input devices
//! commonly run at 44.1 or 48 kHz.  [`resample`] converts between arbitrary
//! rates with plain linear interpolation — deliberately cheap, because the
//! downstream recognizer needs a fixed rate, not broadcast-quality fidelity.

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample `samples` from `src_rate` Hz to `dst_rate` Hz using linear
/// interpolation.
///
/// * If the rates match or `samples` is empty the input is returned unchanged
///   (fast path — no interpolation performed).
/// * Otherwise the output length is `max(1, round(len * dst_rate / src_rate))`,
///   i.e. the input duration re-expressed at the destination rate.
///
/// Output points are uniformly spaced over `[0, duration)` in both coordinate
/// spaces; the source signal is evaluated as a piecewise-linear function and
/// clamped to its last sample past the end.
///
/// # Example
///
/// ```rust
/// use pushtalk::audio::resample;
///
/// // 1 second at 44.1 kHz → exactly 16 000 samples at 16 kHz
/// let audio = vec![0.0_f32; 44_100];
/// assert_eq!(resample(&audio, 44_100, 16_000).len(), 16_000);
///
/// // Matching rates are a no-op
/// let same = resample(&audio, 44_100, 44_100);
/// assert_eq!(same.len(), audio.len());
/// ```
pub fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let duration = samples.len() as f64 / src_rate as f64;
    let target_len = ((duration * dst_rate as f64).round() as usize).max(1);

    // Uniform spacing over [0, duration) in both spaces collapses to a
    // constant step in source-index coordinates.
    let step = samples.len() as f64 / target_len as f64;
    let last = samples.len() - 1;

    let mut output = Vec::with_capacity(target_len);
    for i in 0..target_len {
        let src_pos = i as f64 * step;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx < last {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples[last]
        };
        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
