//! Recording bridge traits and encoder parameter types.
//!
//! The recorder state machine owns one [`RecordingHandle`] at a time. The
//! backend is responsible for the microphone, the encoder and the container;
//! the core only asks it to start, pause, resume, meter and finish.

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Encoder selection. Integer codes follow the host API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoder {
    Aac,
    AacLd,
    AacEld,
    HeAac,
    AmrNb,
    AmrWb,
    Opus,
    Vorbis,
    /// Uncompressed linear PCM.
    Lpcm,
}

impl AudioEncoder {
    pub fn code(self) -> u8 {
        match self {
            AudioEncoder::Aac => 1,
            AudioEncoder::AacLd => 2,
            AudioEncoder::AacEld => 3,
            AudioEncoder::HeAac => 4,
            AudioEncoder::AmrNb => 5,
            AudioEncoder::AmrWb => 6,
            AudioEncoder::Opus => 7,
            AudioEncoder::Vorbis => 8,
            AudioEncoder::Lpcm => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => AudioEncoder::Aac,
            2 => AudioEncoder::AacLd,
            3 => AudioEncoder::AacEld,
            4 => AudioEncoder::HeAac,
            5 => AudioEncoder::AmrNb,
            6 => AudioEncoder::AmrWb,
            7 => AudioEncoder::Opus,
            8 => AudioEncoder::Vorbis,
            9 => AudioEncoder::Lpcm,
            _ => return None,
        })
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Mpeg4,
    ThreeGpp,
    Ogg,
    Webm,
    Mpeg2Ts,
    AacAdts,
    Wav,
}

impl OutputFormat {
    /// File extension used for auto-named recordings.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mpeg4 => "m4a",
            OutputFormat::ThreeGpp => "3gp",
            OutputFormat::Ogg => "ogg",
            OutputFormat::Webm => "webm",
            OutputFormat::Mpeg2Ts => "ts",
            OutputFormat::AacAdts => "aac",
            OutputFormat::Wav => "wav",
        }
    }
}

/// Parameters handed to [`RecorderBackend::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub encoder: AudioEncoder,
    pub output_format: OutputFormat,
    pub sample_rate: u32,
    pub bit_rate: u32,
    pub channels: u16,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            encoder: AudioEncoder::Aac,
            output_format: OutputFormat::Mpeg4,
            sample_rate: 44_100,
            bit_rate: 128_000,
            channels: 1,
        }
    }
}

/// Peak level read from an encoder, in the encoder's own units.
///
/// `peak / max_scale` is the linear level in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeSample {
    pub peak: f32,
    pub max_scale: f32,
}

impl AmplitudeSample {
    pub fn new(peak: f32, max_scale: f32) -> Self {
        Self { peak, max_scale }
    }

    pub fn silent(max_scale: f32) -> Self {
        Self {
            peak: 0.0,
            max_scale,
        }
    }
}

/// An active encoder writing to one output file.
pub trait RecordingHandle: PlatformSendSync {
    fn supports_pause(&self) -> bool;

    fn pause(&self) -> Result<()>;

    fn resume(&self) -> Result<()>;

    /// Peak amplitude observed since the previous call.
    fn amplitude(&self) -> AmplitudeSample;

    /// Flush and close the container. Must be idempotent.
    ///
    /// May block; callers run it on the blocking pool.
    fn finish(&self) -> Result<()>;
}

/// Microphone + encoder factory.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait RecorderBackend: PlatformSendSync {
    async fn start(&self, path: &Path, config: &EncoderConfig)
        -> Result<Box<dyn RecordingHandle>>;

    /// Container actually written when `requested` is asked for.
    fn output_format(&self, requested: OutputFormat) -> OutputFormat {
        requested
    }
}

/// Reads the playable duration of a finished file from its metadata.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait DurationProbe: PlatformSendSync {
    async fn probe_duration(&self, path: &Path) -> Result<Duration>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_codes_round_trip() {
        for code in 1..=9 {
            let encoder = AudioEncoder::from_code(code).unwrap();
            assert_eq!(encoder.code(), code);
        }
        assert_eq!(AudioEncoder::from_code(0), None);
    }

    #[test]
    fn default_encoder_config_targets_m4a() {
        let config = EncoderConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.bit_rate, 128_000);
        assert_eq!(config.output_format.extension(), "m4a");
    }
}
