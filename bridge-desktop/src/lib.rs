//! # Desktop Bridge Implementations
//!
//! Default implementations of the audio bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `RodioPlaybackBackend`: one `rodio::Sink` per loaded track on a shared
//!   output stream
//! - `CpalRecorderBackend`: default input device captured with `cpal`,
//!   written as 32-bit float WAV with `hound`
//! - `DesktopPathAllocator`: recordings directory under the user cache dir
//!
//! Decoding for waveform extraction lives in `core-playback`
//! (`SymphoniaDecoderProvider`) and is platform independent.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{CpalRecorderBackend, DesktopPathAllocator, RodioPlaybackBackend};
//! use std::sync::Arc;
//!
//! let playback = Arc::new(RodioPlaybackBackend::new()?);
//! let recorder = Arc::new(CpalRecorderBackend::new());
//! let paths = Arc::new(DesktopPathAllocator::new());
//! ```

mod playback;
mod recording;
mod storage;

pub use playback::RodioPlaybackBackend;
pub use recording::CpalRecorderBackend;
pub use storage::DesktopPathAllocator;
