//! Workspace placeholder crate.
//!
//! This crate exposes shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-waveform`). Host applications can
//! depend on `waveform-workspace` and enable the documented features without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, WaveformEngine};

#[cfg(feature = "extraction-only")]
pub use core_waveform::{normalize, ExtractionOutcome, WaveformExtractor};
