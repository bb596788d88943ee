//! # Symphonia Decoder Implementation
//!
//! Pull-based PCM decoder behind the bridge [`AudioDecoder`] trait.

use crate::decoder::format_detector::FormatDetector;
use crate::decoder::sample_converter::SampleConverter;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::playback::{
    AudioDecoder, AudioFormat, AudioFrameChunk, AudioSource, DecoderProvider, ProbeResult,
};
use std::path::Path;
use std::time::Duration;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, info, instrument, warn};

/// Corrupt packets tolerated in a row before the stream is declared broken.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Symphonia-backed decoder.
///
/// Packets larger than the requested frame count are split: the remainder
/// is kept and returned by the next [`decode_frames`](AudioDecoder::decode_frames)
/// call, so no frames are dropped.
pub struct SymphoniaDecoder {
    /// Format reader (demuxer), owns the media source stream
    format_reader: Box<dyn FormatReader>,

    decoder: Box<dyn Decoder>,

    track_id: u32,

    format: AudioFormat,

    /// Frame count declared by the container, if any
    total_frames: Option<u64>,

    converter: SampleConverter,

    /// Interleaved samples decoded but not yet handed out
    pending: Vec<f32>,

    /// Frames handed out so far
    position_frames: u64,

    eof: bool,

    source_info: String,
}

impl SymphoniaDecoder {
    /// Open and probe a source.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::FileNotFound`] if a local file does not exist
    /// - [`PlaybackError::InvalidFormat`] if the container is not recognized
    /// - [`PlaybackError::FormatNotDecodable`] if no decodable audio track exists
    #[instrument(skip(source), fields(source = %source.label()))]
    pub async fn new(source: AudioSource) -> Result<Self> {
        debug!("Creating Symphonia decoder");

        let (media_source, hint, source_info) = Self::open_media_source(source)?;

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                media_source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                warn!("Format probe failed: {}", e);
                PlaybackError::InvalidFormat(format!("Failed to probe format: {}", e))
            })?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                PlaybackError::FormatNotDecodable("No supported audio tracks".to_string())
            })?;

        let track_id = track.id;
        let codec = FormatDetector::detect_codec(track.codec_params.codec);

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PlaybackError::InvalidFormat("Missing sample rate".to_string()))?;

        // Some containers (AAC in MP4) only report channels after the first packet.
        let channels = track
            .codec_params
            .channels
            .map(|ch| ch.count() as u16)
            .unwrap_or(2);

        let bits_per_sample = track.codec_params.bits_per_sample.map(|b| b as u16);
        let total_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                PlaybackError::FormatNotDecodable(format!("Failed to create codec decoder: {}", e))
            })?;

        info!(
            codec = ?codec,
            sample_rate,
            channels,
            total_frames = ?total_frames,
            "Decoder initialized"
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            format: AudioFormat::new(codec, sample_rate, channels, bits_per_sample),
            total_frames,
            converter: SampleConverter::new(),
            pending: Vec::new(),
            position_frames: 0,
            eof: false,
            source_info,
        })
    }

    fn open_media_source(source: AudioSource) -> Result<(MediaSourceStream, Hint, String)> {
        match source {
            AudioSource::LocalFile { path } => Self::open_local_file(&path),
        }
    }

    fn open_local_file(path: &Path) -> Result<(MediaSourceStream, Hint, String)> {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlaybackError::FileNotFound(label.clone())
            } else {
                PlaybackError::SourceError(format!("Failed to open {}: {}", label, e))
            }
        })?;

        let hint = FormatDetector::hint_from_path(path);
        let media_source = Box::new(file) as Box<dyn MediaSource>;
        let mss = MediaSourceStream::new(media_source, Default::default());

        Ok((mss, hint, label))
    }

    /// Read and decode the next packet of the selected track.
    ///
    /// Corrupt packets are skipped up to [`MAX_CONSECUTIVE_ERRORS`] in a row.
    /// Returns `Ok(None)` at end of stream.
    #[instrument(skip(self), level = "trace", fields(source = %self.source_info))]
    fn decode_next_packet(&mut self) -> Result<Option<Vec<f32>>> {
        if self.eof {
            return Ok(None);
        }

        let mut consecutive_errors = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of stream at {} frames", self.position_frames);
                    self.eof = true;
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(PlaybackError::DecoderError(
                        "Track list changed, reset required".to_string(),
                    ));
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "I/O error reading packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::SourceError(format!(
                            "Stream I/O failure after {} attempts: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    error!("Fatal format reader error: {}", e);
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            while !self.format_reader.metadata().is_latest() {
                self.format_reader.metadata().pop();
            }

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let decoded_channels = decoded.spec().channels.count() as u16;
                    if self.format.channels != decoded_channels {
                        debug!(
                            "Updating channel count from {} to {}",
                            self.format.channels, decoded_channels
                        );
                        self.format.channels = decoded_channels;
                    }

                    return Ok(Some(self.converter.to_interleaved_f32(decoded)));
                }
                Err(SymphoniaError::IoError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupted packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::CorruptedStream(format!(
                            "Stream corruption after {} failed packets",
                            MAX_CONSECUTIVE_ERRORS
                        )));
                    }
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping packet with decode error (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::DecoderError(format!(
                            "Decoder failure after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, err
                        )));
                    }
                }
                Err(e) => {
                    error!("Fatal decode error: {}", e);
                    return Err(PlaybackError::DecoderError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }
    }

    fn timestamp_of(&self, frame: u64) -> Duration {
        Duration::from_secs_f64(frame as f64 / self.format.sample_rate.max(1) as f64)
    }

    /// Decode up to `max_frames` frames.
    pub fn next_chunk(&mut self, max_frames: usize) -> Result<Option<AudioFrameChunk>> {
        let max_frames = max_frames.max(1);

        while self.pending.is_empty() {
            match self.decode_next_packet()? {
                Some(samples) => self.pending = samples,
                None => return Ok(None),
            }
        }

        let channels = self.format.channels.max(1);
        let available = self.pending.len() / channels as usize;
        let frames = available.min(max_frames);
        let take = (frames * channels as usize).min(self.pending.len());

        let rest = self.pending.split_off(take);
        let samples = std::mem::replace(&mut self.pending, rest);

        let timestamp = self.timestamp_of(self.position_frames);
        self.position_frames += frames as u64;

        Ok(Some(AudioFrameChunk::new(samples, channels, timestamp)))
    }

    pub fn probe_result(&self) -> ProbeResult {
        ProbeResult::new(self.format.clone()).with_total_frames(self.total_frames)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AudioDecoder for SymphoniaDecoder {
    async fn probe(&mut self) -> BridgeResult<ProbeResult> {
        Ok(self.probe_result())
    }

    async fn decode_frames(&mut self, max_frames: usize) -> BridgeResult<Option<AudioFrameChunk>> {
        Ok(self.next_chunk(max_frames)?)
    }
}

/// [`DecoderProvider`] that opens a [`SymphoniaDecoder`] per source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoderProvider;

impl SymphoniaDecoderProvider {
    pub fn new() -> Self {
        Self
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl DecoderProvider for SymphoniaDecoderProvider {
    async fn open(&self, source: &AudioSource) -> BridgeResult<Box<dyn AudioDecoder>> {
        let decoder = SymphoniaDecoder::new(source.clone()).await?;
        Ok(Box::new(decoder))
    }
}
