//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the
//! waveform engine.
//!
//! ## Overview
//!
//! The engine never touches audio hardware, codecs or the filesystem layout
//! directly. Every capability it consumes is a trait here, implemented per
//! platform (`bridge-desktop` on desktop, native shims on iOS/Android).
//!
//! ## Traits
//!
//! ### Audio
//! - [`DecoderProvider`](playback::DecoderProvider) / [`AudioDecoder`](playback::AudioDecoder) - PCM source for waveform extraction
//! - [`PlaybackBackend`](playback::PlaybackBackend) / [`PlaybackHandle`](playback::PlaybackHandle) - Native transport for player sessions
//! - [`RecorderBackend`](recording::RecorderBackend) / [`RecordingHandle`](recording::RecordingHandle) - Microphone + encoder
//! - [`DurationProbe`](recording::DurationProbe) - Duration of a finished file
//!
//! ### Storage
//! - [`PathAllocator`](storage::PathAllocator) - Where auto-named recordings go
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall clock for deterministic naming in tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Sessions
//! translate it into their own error types at the boundary, so raw platform
//! failures never reach the engine's public API.
//!
//! ## Thread Safety
//!
//! Bridge objects are `Send + Sync` on native targets (see
//! [`platform`]). Player tickers and the extraction loop call into them from
//! tokio tasks.

pub mod error;
pub mod platform;
pub mod playback;
pub mod recording;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use playback::{
    AudioCodec, AudioDecoder, AudioFormat, AudioFrameChunk, AudioSource, DecoderProvider,
    PlaybackBackend, PlaybackHandle, PlaybackOptions, ProbeResult,
};
pub use recording::{
    AmplitudeSample, AudioEncoder, DurationProbe, EncoderConfig, OutputFormat, RecorderBackend,
    RecordingHandle,
};
pub use storage::PathAllocator;
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
