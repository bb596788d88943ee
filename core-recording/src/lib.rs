//! # Core Recording
//!
//! Microphone recording for the waveform engine.
//!
//! ## Overview
//!
//! - [`Recorder`]: the single recording session (start, pause, resume,
//!   stop) with an amplitude ticker and a minimum-duration guard
//! - [`meter`]: peak to decibel / linear meter conversion
//! - [`naming`]: timestamped file names for recordings without a path
//! - [`LoftyDurationProbe`]: reads the finished file's duration
//!
//! ## Usage
//!
//! ```ignore
//! let recorder = Recorder::new(bridges, bus.clone(), RecorderSettings::default());
//! recorder.start(RecordingRequest::new().with_legacy_mode(true)).await?;
//! // ...
//! if let Some(done) = recorder.stop().await? {
//!     println!("{} ({} ms)", done.path.display(), done.duration_ms);
//! }
//! ```

pub mod error;
pub mod meter;
pub mod naming;
pub mod probe;
pub mod recorder;

pub use error::{RecordingError, Result};
pub use probe::LoftyDurationProbe;
pub use recorder::{Recorder, RecorderBridges, RecorderSettings, RecordingRequest, RecordingResult};
