//! Amplitude to meter-value conversion.
//!
//! Legacy mode reports decibels relative to full scale,
//! `20 * log10(peak / max_scale)`, with silence reported as `0` instead of
//! negative infinity. Linear mode reports `peak / max_scale` in `[0, 1]`.

use bridge_traits::recording::AmplitudeSample;

/// Decibels relative to full scale. Non-finite results (silence, zero
/// scale) become `0.0`.
pub fn legacy_decibel(sample: AmplitudeSample) -> f32 {
    let db = 20.0 * (sample.peak.abs() / sample.max_scale).log10();
    if db.is_finite() {
        db
    } else {
        0.0
    }
}

/// Linear peak in `[0, 1]`.
pub fn linear_level(sample: AmplitudeSample) -> f32 {
    let level = sample.peak.abs() / sample.max_scale;
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Meter value for the configured mode.
pub fn meter_value(sample: AmplitudeSample, legacy_mode: bool) -> f32 {
    if legacy_mode {
        legacy_decibel(sample)
    } else {
        linear_level(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_is_zero_decibels() {
        let db = legacy_decibel(AmplitudeSample::new(32_767.0, 32_767.0));
        assert!(db.abs() < 1e-4);
    }

    #[test]
    fn half_scale_is_about_minus_six_decibels() {
        let db = legacy_decibel(AmplitudeSample::new(0.5, 1.0));
        assert!((db + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn silence_is_clamped_to_zero() {
        assert_eq!(legacy_decibel(AmplitudeSample::silent(32_767.0)), 0.0);
        assert_eq!(legacy_decibel(AmplitudeSample::new(0.3, 0.0)), 0.0);
    }

    #[test]
    fn linear_level_is_bounded() {
        assert_eq!(linear_level(AmplitudeSample::new(0.25, 1.0)), 0.25);
        assert_eq!(linear_level(AmplitudeSample::new(2.0, 1.0)), 1.0);
        assert_eq!(linear_level(AmplitudeSample::new(0.5, 0.0)), 0.0);
        assert_eq!(linear_level(AmplitudeSample::new(f32::NAN, 1.0)), 0.0);
    }

    #[test]
    fn mode_selects_conversion() {
        let sample = AmplitudeSample::new(0.1, 1.0);
        assert!((meter_value(sample, true) + 20.0).abs() < 1e-4);
        assert!((meter_value(sample, false) - 0.1).abs() < 1e-6);
    }
}
