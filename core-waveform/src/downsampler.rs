//! # RMS Downsampler
//!
//! Reduces a PCM stream to a fixed number of amplitude buckets.
//!
//! ## Bucketing
//!
//! The bucket width is `total_frames / expected_points` (at least one frame).
//! Each channel accumulates its own sum of squares; a closed bucket is the
//! mean of the per-channel RMS values.
//!
//! The last bucket never closes on width. Frames left over by the integer
//! division keep accumulating into it until [`RmsDownsampler::finish`], so
//! the output never exceeds `expected_points`. A stream that ends early
//! flushes its partial bucket instead.

use crate::error::{Result, WaveformError};
use bridge_traits::playback::AudioFrameChunk;

/// Streaming per-channel RMS accumulator.
#[derive(Debug, Clone)]
pub struct RmsDownsampler {
    expected_points: usize,
    bucket_width: u64,
    sums: Vec<f64>,
    count: u64,
    buckets: Vec<f32>,
}

impl RmsDownsampler {
    /// # Errors
    ///
    /// [`WaveformError::Validation`] when `expected_points` or `channels` is 0.
    pub fn new(total_frames: u64, expected_points: usize, channels: u16) -> Result<Self> {
        if expected_points == 0 {
            return Err(WaveformError::Validation(
                "expected point count must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(WaveformError::Validation(
                "stream reports zero channels".to_string(),
            ));
        }

        // The host picks the point count; a stream never yields more
        // buckets than frames.
        let frames = usize::try_from(total_frames.max(1)).unwrap_or(usize::MAX);

        Ok(Self {
            expected_points,
            bucket_width: (total_frames / expected_points as u64).max(1),
            sums: vec![0.0; channels as usize],
            count: 0,
            buckets: Vec::with_capacity(expected_points.min(frames)),
        })
    }

    pub fn bucket_width(&self) -> u64 {
        self.bucket_width
    }

    pub fn expected_points(&self) -> usize {
        self.expected_points
    }

    /// Buckets closed so far.
    pub fn buckets(&self) -> &[f32] {
        &self.buckets
    }

    /// Closed buckets over expected points.
    pub fn progress(&self) -> f32 {
        (self.buckets.len() as f32 / self.expected_points as f32).min(1.0)
    }

    /// Accumulate one interleaved chunk. Returns the number of buckets it
    /// closed.
    pub fn push_chunk(&mut self, chunk: &AudioFrameChunk) -> usize {
        let before = self.buckets.len();
        for frame in chunk.frames_iter() {
            self.push_frame(frame);
        }
        self.buckets.len() - before
    }

    /// Accumulate one frame (one sample per channel).
    pub fn push_frame(&mut self, frame: &[f32]) {
        if frame.len() != self.sums.len() {
            // Decoders may only learn the real layout after the first packet.
            self.sums.resize(frame.len().max(1), 0.0);
        }

        for (sum, sample) in self.sums.iter_mut().zip(frame) {
            let sample = f64::from(*sample);
            *sum += sample * sample;
        }
        self.count += 1;

        let last_open = self.buckets.len() + 1 >= self.expected_points;
        if self.count >= self.bucket_width && !last_open {
            self.close_bucket();
        }
    }

    fn close_bucket(&mut self) {
        if self.count == 0 || self.buckets.len() >= self.expected_points {
            return;
        }

        let count = self.count as f64;
        let mean_rms = self
            .sums
            .iter()
            .map(|sum| (sum / count).sqrt())
            .sum::<f64>()
            / self.sums.len() as f64;

        self.buckets.push(mean_rms as f32);
        self.sums.iter_mut().for_each(|sum| *sum = 0.0);
        self.count = 0;
    }

    /// Close the trailing bucket and return all buckets.
    pub fn finish(mut self) -> Vec<f32> {
        self.close_bucket();
        self.buckets
    }
}
