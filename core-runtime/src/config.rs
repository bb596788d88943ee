//! # Engine Configuration Module
//!
//! Tunables for the waveform engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder to construct an [`EngineConfig`].
//! Every value has a working default; the builder only validates what the
//! caller overrides and fails fast with an actionable [`Error::Config`] when
//! a value falls outside its allowed range.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .max_concurrent_players(12)
//!     .min_recording_duration(Duration::from_millis(750))
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.max_concurrent_players, 12);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::{EngineConfig, UpdateIntervals};
//! use std::time::Duration;
//!
//! // High-frequency ticks faster than 50ms are rejected.
//! let config = EngineConfig::builder()
//!     .update_intervals(UpdateIntervals {
//!         high: Duration::from_millis(10),
//!         ..UpdateIntervals::default()
//!     })
//!     .build()
//!     .expect("Should fail - tick period out of range");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::session::UpdateFrequency;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Default cap on player sessions holding a decoded track.
pub const MAX_CONCURRENT_PLAYERS: usize = 30;

/// Default output scale of the normalizer.
pub const DEFAULT_NORMALIZE_SCALE: f32 = 0.12;

/// Default silence gate of the normalizer.
pub const DEFAULT_NORMALIZE_THRESHOLD: f32 = 0.01;

/// Default `chrono` format for auto-named recordings.
pub const DEFAULT_FILE_NAME_FORMAT: &str = "%d-%m-%y-%H-%M-%S";

const HIGH_RANGE_MS: RangeInclusive<u64> = 50..=250;
const MEDIUM_RANGE_MS: RangeInclusive<u64> = 100..=500;
const LOW_RANGE_MS: RangeInclusive<u64> = 200..=1000;

/// Tick periods for the three [`UpdateFrequency`] presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateIntervals {
    pub high: Duration,
    pub medium: Duration,
    pub low: Duration,
}

impl Default for UpdateIntervals {
    fn default() -> Self {
        Self {
            high: Duration::from_millis(50),
            medium: Duration::from_millis(100),
            low: Duration::from_millis(200),
        }
    }
}

impl UpdateIntervals {
    /// Period for a preset.
    pub fn period(&self, frequency: UpdateFrequency) -> Duration {
        match frequency {
            UpdateFrequency::High => self.high,
            UpdateFrequency::Medium => self.medium,
            UpdateFrequency::Low => self.low,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("high", self.high, HIGH_RANGE_MS)?;
        check_range("medium", self.medium, MEDIUM_RANGE_MS)?;
        check_range("low", self.low, LOW_RANGE_MS)?;

        if self.high > self.medium || self.medium > self.low {
            return Err(Error::Config(
                "Update intervals must satisfy high <= medium <= low".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: Duration, range: RangeInclusive<u64>) -> Result<()> {
    let millis = value.as_millis() as u64;
    if !range.contains(&millis) {
        return Err(Error::Config(format!(
            "{} update interval {}ms is outside {}..={}ms",
            name,
            millis,
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

/// Normalizer parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationConfig {
    /// Largest magnitude of a normalized bucket.
    pub scale: f32,
    /// Buckets quieter than this become exactly zero.
    pub threshold: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_NORMALIZE_SCALE,
            threshold: DEFAULT_NORMALIZE_THRESHOLD,
        }
    }
}

impl NormalizationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::Config(format!(
                "Normalization scale must be a positive number, got {}",
                self.scale
            )));
        }
        if !self.threshold.is_finite() || !(0.0..1.0).contains(&self.threshold) {
            return Err(Error::Config(format!(
                "Normalization threshold must be in [0, 1), got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Recorder defaults used when a start request leaves a field out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingDefaults {
    pub sample_rate: u32,
    pub bit_rate: u32,
    /// `chrono` strftime pattern for auto-named files.
    pub file_name_format: String,
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bit_rate: 128_000,
            file_name_format: DEFAULT_FILE_NAME_FORMAT.to_string(),
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Cap on player sessions holding a decoded track.
    pub max_concurrent_players: usize,

    pub update_intervals: UpdateIntervals,

    /// Recordings shorter than this are rejected on stop.
    pub min_recording_duration: Duration,

    pub normalization: NormalizationConfig,

    pub recording: RecordingDefaults,

    /// Speeds above this are clamped.
    pub max_playback_speed: f32,

    /// Broadcast buffer per subscriber.
    pub event_buffer_size: usize,

    /// Frames requested from the decoder per extraction step.
    pub extraction_chunk_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_players: MAX_CONCURRENT_PLAYERS,
            update_intervals: UpdateIntervals::default(),
            min_recording_duration: Duration::from_millis(500),
            normalization: NormalizationConfig::default(),
            recording: RecordingDefaults::default(),
            max_playback_speed: 2.0,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            extraction_chunk_frames: 4096,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=256).contains(&self.max_concurrent_players) {
            return Err(Error::Config(format!(
                "max_concurrent_players must be in 1..=256, got {}",
                self.max_concurrent_players
            )));
        }

        self.update_intervals.validate()?;
        self.normalization.validate()?;

        if self.min_recording_duration > Duration::from_secs(60) {
            return Err(Error::Config(
                "min_recording_duration exceeds maximum of 60 seconds".to_string(),
            ));
        }

        if self.recording.sample_rate == 0 || self.recording.bit_rate == 0 {
            return Err(Error::Config(
                "Recording sample rate and bit rate must be greater than 0".to_string(),
            ));
        }

        if self.recording.file_name_format.trim().is_empty() {
            return Err(Error::Config(
                "Recording file name format cannot be empty".to_string(),
            ));
        }

        if !self.max_playback_speed.is_finite() || self.max_playback_speed < 1.0 {
            return Err(Error::Config(format!(
                "max_playback_speed must be >= 1.0, got {}",
                self.max_playback_speed
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }

        if self.extraction_chunk_frames == 0 {
            return Err(Error::Config(
                "extraction_chunk_frames must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Tick period for a preset.
    pub fn tick_period(&self, frequency: UpdateFrequency) -> Duration {
        self.update_intervals.period(frequency)
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Cap on track-holding player sessions.
    ///
    /// Default: 30
    pub fn max_concurrent_players(mut self, max: usize) -> Self {
        self.config.max_concurrent_players = max;
        self
    }

    /// Tick periods for the High/Medium/Low presets.
    ///
    /// Default: 50ms / 100ms / 200ms
    pub fn update_intervals(mut self, intervals: UpdateIntervals) -> Self {
        self.config.update_intervals = intervals;
        self
    }

    /// Minimum recorded time accepted by `stop`.
    ///
    /// Default: 500ms
    pub fn min_recording_duration(mut self, duration: Duration) -> Self {
        self.config.min_recording_duration = duration;
        self
    }

    /// Default: scale 0.12, threshold 0.01
    pub fn normalization(mut self, normalization: NormalizationConfig) -> Self {
        self.config.normalization = normalization;
        self
    }

    /// Default: 44100 Hz, 128 kbps, `%d-%m-%y-%H-%M-%S`
    pub fn recording_defaults(mut self, recording: RecordingDefaults) -> Self {
        self.config.recording = recording;
        self
    }

    /// Default: 2.0
    pub fn max_playback_speed(mut self, speed: f32) -> Self {
        self.config.max_playback_speed = speed;
        self
    }

    /// Default: 100 events
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    /// Default: 4096 frames
    pub fn extraction_chunk_frames(mut self, frames: usize) -> Self {
        self.config.extraction_chunk_frames = frames;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_players, 30);
        assert_eq!(config.min_recording_duration, Duration::from_millis(500));
        assert_eq!(config.normalization.scale, 0.12);
        assert_eq!(config.normalization.threshold, 0.01);
    }

    #[test]
    fn builder_overrides() {
        let config = EngineConfig::builder()
            .max_concurrent_players(4)
            .max_playback_speed(3.0)
            .extraction_chunk_frames(1024)
            .build()
            .unwrap();

        assert_eq!(config.max_concurrent_players, 4);
        assert_eq!(config.max_playback_speed, 3.0);
        assert_eq!(config.extraction_chunk_frames, 1024);
    }

    #[test]
    fn tick_period_maps_presets() {
        let config = EngineConfig::default();
        assert_eq!(
            config.tick_period(UpdateFrequency::High),
            Duration::from_millis(50)
        );
        assert_eq!(
            config.tick_period(UpdateFrequency::Low),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn rejects_out_of_range_intervals() {
        let too_slow = UpdateIntervals {
            low: Duration::from_millis(1500),
            ..UpdateIntervals::default()
        };
        assert!(EngineConfig::builder()
            .update_intervals(too_slow)
            .build()
            .is_err());

        let inverted = UpdateIntervals {
            high: Duration::from_millis(250),
            medium: Duration::from_millis(100),
            low: Duration::from_millis(200),
        };
        let err = inverted.validate().unwrap_err();
        assert!(err.to_string().contains("high <= medium <= low"));
    }

    #[test]
    fn rejects_bad_normalization() {
        let zero_scale = NormalizationConfig {
            scale: 0.0,
            ..NormalizationConfig::default()
        };
        assert!(EngineConfig::builder()
            .normalization(zero_scale)
            .build()
            .is_err());

        let full_threshold = NormalizationConfig {
            threshold: 1.0,
            ..NormalizationConfig::default()
        };
        assert!(full_threshold.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity_and_slow_speed_cap() {
        assert!(EngineConfig::builder()
            .max_concurrent_players(0)
            .build()
            .is_err());
        assert!(EngineConfig::builder()
            .max_playback_speed(0.5)
            .build()
            .is_err());
    }
}
