//! Display normalization for completed waveforms.
//!
//! Values below the threshold are zeroed (noise floor), the rest are scaled
//! so the loudest qualifying value maps to `scale`.

use core_runtime::config::NormalizationConfig;

/// Normalize `samples` into `[-scale, scale]`.
///
/// The reference amplitude is the largest `|s|` with `|s| >= threshold`,
/// or 1.0 when nothing qualifies.
///
/// ```
/// use core_waveform::normalize;
///
/// let out = normalize(&[0.5, 0.25, 0.001], 0.12, 0.01);
/// assert_eq!(out, vec![0.12, 0.06, 0.0]);
/// ```
pub fn normalize(samples: &[f32], scale: f32, threshold: f32) -> Vec<f32> {
    let max_amplitude = samples
        .iter()
        .map(|s| s.abs())
        .filter(|a| *a >= threshold && a.is_finite())
        .fold(None, |max: Option<f32>, a| Some(max.map_or(a, |m| m.max(a))))
        .filter(|m| *m > 0.0)
        .unwrap_or(1.0);

    samples
        .iter()
        .map(|&s| {
            if !s.is_finite() || s.abs() < threshold {
                0.0
            } else {
                (s / max_amplitude * scale).clamp(-scale, scale)
            }
        })
        .collect()
}

/// [`normalize`] with engine configuration values.
pub fn normalize_with(samples: &[f32], config: &NormalizationConfig) -> Vec<f32> {
    normalize(samples, config.scale, config.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_are_bounded_by_scale() {
        let samples = [0.9, -0.45, 0.3, 0.05, 0.6];
        let out = normalize(&samples, 0.12, 0.01);
        assert!(out.iter().all(|v| v.abs() <= 0.12));
        assert!((out[0] - 0.12).abs() < 1e-6);
        assert!((out[1] + 0.06).abs() < 1e-6);
    }

    #[test]
    fn values_under_threshold_are_exactly_zero() {
        let out = normalize(&[0.009, -0.0099, 0.2], 0.12, 0.01);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 0.12).abs() < 1e-6);
    }

    #[test]
    fn all_silent_input_stays_silent() {
        let out = normalize(&[0.0, 0.001, 0.002], 0.12, 0.01);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
        assert!(normalize(&[], 0.12, 0.01).is_empty());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let out = normalize(&[0.01, 0.02], 0.12, 0.01);
        assert!((out[0] - 0.06).abs() < 1e-6);
        assert!((out[1] - 0.12).abs() < 1e-6);
    }

    #[test]
    fn config_defaults_match_free_function() {
        let samples = [0.4, 0.2, 0.0];
        assert_eq!(
            normalize_with(&samples, &NormalizationConfig::default()),
            normalize(&samples, 0.12, 0.01)
        );
    }
}
