//! # Waveform Module
//!
//! Fixed-length amplitude summaries of audio files.
//!
//! ## Overview
//!
//! - [`RmsDownsampler`] reduces a PCM stream to N per-channel-averaged RMS
//!   buckets, folding the trailing remainder into the last bucket
//! - [`normalize`] maps buckets into `[-scale, scale]` with a noise-floor
//!   threshold
//! - [`WaveformExtractor`] drives a bridge decoder through both, emitting
//!   progress events and honouring forced stops
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_playback::SymphoniaDecoderProvider;
//! use core_runtime::{EventBus, SessionKey};
//! use core_waveform::{ExtractionOutcome, ExtractorSettings, WaveformExtractor};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> core_waveform::Result<()> {
//! let extractor = WaveformExtractor::new(
//!     SessionKey::new("clip-1").unwrap(),
//!     Arc::new(SymphoniaDecoderProvider::new()),
//!     EventBus::default(),
//!     ExtractorSettings::default(),
//! );
//!
//! if let ExtractionOutcome::Completed(samples) =
//!     extractor.extract(Path::new("/recordings/clip.wav"), 100).await?
//! {
//!     println!("{} buckets", samples.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod downsampler;
pub mod error;
pub mod extractor;
pub mod normalizer;

pub use downsampler::RmsDownsampler;
pub use error::{Result, WaveformError};
pub use extractor::{ExtractionOutcome, ExtractionStatus, ExtractorSettings, WaveformExtractor};
pub use normalizer::{normalize, normalize_with};
