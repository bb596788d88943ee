//! Decoder and playback bridge traits plus the audio types they exchange.
//!
//! Two collaborators live here:
//!
//! - the **decoder adapter** ([`DecoderProvider`] / [`AudioDecoder`]), a
//!   pull-based source of normalized PCM used by waveform extraction;
//! - the **playback backend** ([`PlaybackBackend`] / [`PlaybackHandle`]), the
//!   native audio engine a player session drives.
//!
//! Handle methods are synchronous: native transport calls return immediately
//! and player sessions call them while holding their session lock.

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Codec identifiers reported by decoders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCodec {
    Mp3,
    Aac,
    Flac,
    Vorbis,
    Opus,
    Wav,
    Alac,
    Unknown,
    Other(String),
}

/// PCM layout produced by a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: u16,
    /// Source bit depth when the container reports it.
    pub bits_per_sample: Option<u16>,
}

impl AudioFormat {
    pub fn new(
        codec: AudioCodec,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: Option<u16>,
    ) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
            bits_per_sample,
        }
    }
}

/// Where a decoder reads its bytes from.
#[derive(Debug, Clone)]
pub enum AudioSource {
    LocalFile { path: PathBuf },
}

impl AudioSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        AudioSource::LocalFile { path: path.into() }
    }

    /// Short label for logs. Local files are reduced to their file name.
    pub fn label(&self) -> String {
        match self {
            AudioSource::LocalFile { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// Decoded PCM frames, interleaved, normalized to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrameChunk {
    pub samples: Vec<f32>,
    /// Frames in `samples` (one frame = one sample per channel).
    pub frames: usize,
    pub channels: u16,
    /// Presentation time of the first frame.
    pub timestamp: Duration,
}

impl AudioFrameChunk {
    pub fn new(samples: Vec<f32>, channels: u16, timestamp: Duration) -> Self {
        let frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };
        Self {
            samples,
            frames,
            channels,
            timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0 || self.samples.is_empty()
    }

    /// Iterate over frames as channel slices.
    pub fn frames_iter(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.chunks_exact(self.channels.max(1) as usize)
    }
}

/// Stream facts resolved by [`AudioDecoder::probe`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub format: AudioFormat,
    pub duration: Option<Duration>,
    /// Total frame count, when the container declares it.
    pub total_frames: Option<u64>,
}

impl ProbeResult {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            duration: None,
            total_frames: None,
        }
    }

    pub fn with_total_frames(mut self, total_frames: Option<u64>) -> Self {
        self.total_frames = total_frames;
        self.duration = match (total_frames, self.format.sample_rate) {
            (Some(frames), rate) if rate > 0 => {
                Some(Duration::from_secs_f64(frames as f64 / rate as f64))
            }
            _ => self.duration,
        };
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }
}

/// Pull-based PCM source.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioDecoder: PlatformSend {
    /// Inspect the stream and return format metadata.
    async fn probe(&mut self) -> Result<ProbeResult>;

    /// Decode up to `max_frames` frames. `Ok(None)` marks end of stream.
    async fn decode_frames(&mut self, max_frames: usize) -> Result<Option<AudioFrameChunk>>;
}

/// Opens decoders for audio sources.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait DecoderProvider: PlatformSendSync {
    /// Open a decoder. A missing file must surface as
    /// [`BridgeError::NotFound`](crate::BridgeError::NotFound).
    async fn open(&self, source: &AudioSource) -> Result<Box<dyn AudioDecoder>>;
}

/// Initial transport settings applied when a track is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub start_position: Duration,
    /// 0.0 = muted, 1.0 = unity gain.
    pub initial_volume: f32,
    pub speed: f32,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_position: Duration::ZERO,
            initial_volume: 1.0,
            speed: 1.0,
        }
    }
}

impl PlaybackOptions {
    pub fn with_start_position(mut self, position: Duration) -> Self {
        self.start_position = position;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.initial_volume = volume;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

/// A loaded, resource-bound native track.
///
/// Handles start paused. [`release`](PlaybackHandle::release) must be
/// idempotent; every other call after release fails or returns defaults.
pub trait PlaybackHandle: PlatformSendSync {
    fn duration(&self) -> Duration;

    fn position(&self) -> Duration;

    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn seek(&self, position: Duration) -> Result<()>;

    fn set_volume(&self, volume: f32) -> Result<()>;

    fn set_speed(&self, speed: f32) -> Result<()>;

    /// `true` once the track played through to its natural end.
    fn is_finished(&self) -> bool;

    fn release(&self);
}

/// Native audio engine able to load tracks.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait PlaybackBackend: PlatformSendSync {
    async fn load(&self, path: &Path, options: PlaybackOptions)
        -> Result<Box<dyn PlaybackHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_options_default_values() {
        let opts = PlaybackOptions::default();
        assert_eq!(opts.start_position, Duration::ZERO);
        assert_eq!(opts.initial_volume, 1.0);
        assert_eq!(opts.speed, 1.0);
    }

    #[test]
    fn frame_chunk_counts_frames_per_channel() {
        let chunk = AudioFrameChunk::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, Duration::ZERO);
        assert_eq!(chunk.frames, 3);
        let frames: Vec<&[f32]> = chunk.frames_iter().collect();
        assert_eq!(frames[1], &[0.3, 0.4]);
        assert!(AudioFrameChunk::new(Vec::new(), 2, Duration::ZERO).is_empty());
    }

    #[test]
    fn probe_result_derives_duration_from_frames() {
        let format = AudioFormat::new(AudioCodec::Wav, 8_000, 1, Some(16));
        let probe = ProbeResult::new(format).with_total_frames(Some(24_000));
        assert_eq!(probe.duration, Some(Duration::from_secs(3)));
    }

    #[test]
    fn source_label_strips_directories() {
        let source = AudioSource::local("/home/user/recordings/take-1.wav");
        assert_eq!(source.label(), "take-1.wav");
    }
}
