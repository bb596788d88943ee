//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the waveform engine crates:
//! - Logging and tracing setup
//! - Engine configuration and defaults
//! - Session identity and state vocabulary
//! - Event bus for player, extraction and recorder notifications
//! - Restartable periodic ticker
//!
//! ## Overview
//!
//! Nothing in this crate touches audio. Playback, extraction and recording
//! crates build on these types so that a host sees one consistent set of
//! session keys, states and events regardless of which component produced
//! them.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod session;
pub mod ticker;

pub use config::{EngineConfig, EngineConfigBuilder, MAX_CONCURRENT_PLAYERS};
pub use error::{Error, Result};
pub use events::{
    CoreEvent, EventBus, EventSeverity, EventStream, ExtractionEvent, PlayerEvent, RecorderEvent,
};
pub use session::{
    DurationType, FinishMode, PlayerState, RecorderState, SessionKey, UpdateFrequency,
};
pub use ticker::{TickControl, Ticker};
