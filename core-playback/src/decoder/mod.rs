//! # Audio Decoder Module
//!
//! PCM decoding with the Symphonia library.
//!
//! ## Overview
//!
//! [`SymphoniaDecoder`] implements the bridge `AudioDecoder` trait and
//! [`SymphoniaDecoderProvider`] opens one per source. Waveform extraction
//! consumes them through the trait only, so hosts with a native decoder can
//! swap in their own provider.
//!
//! ## Architecture
//!
//! ```text
//! AudioSource → MediaSourceStream → FormatReader → Decoder → AudioFrameChunk
//! ```
//!
//! Every sample format symphonia produces (8/16/24/32-bit integer, 32/64-bit
//! float) is normalized to interleaved `f32` in `[-1.0, 1.0]`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bridge_traits::playback::{AudioDecoder, AudioSource};
//! use core_playback::SymphoniaDecoder;
//!
//! # async fn example() -> core_playback::Result<()> {
//! let mut decoder = SymphoniaDecoder::new(AudioSource::local("/path/to/take.wav")).await?;
//! let probe = decoder.probe_result();
//! println!("{} Hz, {:?} frames", probe.format.sample_rate, probe.total_frames);
//!
//! while let Some(chunk) = decoder.next_chunk(4096)? {
//!     println!("Decoded {} frames", chunk.frames);
//! }
//! # Ok(())
//! # }
//! ```

mod format_detector;
mod sample_converter;
mod symphonia;

pub use self::symphonia::{SymphoniaDecoder, SymphoniaDecoderProvider};
pub use format_detector::FormatDetector;
pub use sample_converter::SampleConverter;
