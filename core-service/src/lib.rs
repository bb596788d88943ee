//! # Core Service
//!
//! Engine façade wiring the player, waveform and recording crates to the
//! host-provided bridges.
//!
//! ## Overview
//!
//! - [`WaveformEngine`]: every host operation, keyed by session
//! - [`SessionRegistry`]: session maps and the concurrent player cap
//! - [`CoreError`] / [`ErrorKind`]: one error type with a host-facing
//!   classification
//!
//! Desktop hosts enable the `desktop-shims` feature (default) and call
//! [`WaveformEngine::desktop`]; other hosts pass their own bridges through
//! [`EngineDependencies`].

pub mod engine;
pub mod error;
pub mod registry;

pub use engine::{EngineDependencies, WaveformEngine};
pub use error::{CoreError, ErrorKind, Result};
pub use registry::{SessionRegistry, SlotReservation};

pub use core_playback::PrepareRequest;
pub use core_recording::{RecordingRequest, RecordingResult};
pub use core_runtime::config::EngineConfig;
pub use core_runtime::events::{CoreEvent, EventStream};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
pub use core_runtime::session::{DurationType, FinishMode, UpdateFrequency};
pub use core_waveform::ExtractionOutcome;
