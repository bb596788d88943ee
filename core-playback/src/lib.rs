//! # Playback Module
//!
//! Audio decoding and player sessions.
//!
//! ## Overview
//!
//! This crate handles:
//! - PCM decoding with symphonia behind the bridge `DecoderProvider` trait
//! - Player session state machines (prepare, start, pause, stop, seek,
//!   volume, speed) driving a native `PlaybackBackend`
//! - Finish-mode handling and periodic position events

pub mod decoder;
pub mod error;
pub mod player;

pub use decoder::{FormatDetector, SampleConverter, SymphoniaDecoder, SymphoniaDecoderProvider};
pub use error::{PlaybackError, Result};
pub use player::{PlayerSession, PlayerSettings, PrepareRequest};
