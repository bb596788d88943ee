//! # Engine Error Types
//!
//! [`CoreError`] aggregates the per-crate errors behind one type and sorts
//! them into the host-facing [`ErrorKind`] taxonomy.

use bridge_traits::error::BridgeError;
use core_playback::PlaybackError;
use core_recording::RecordingError;
use core_waveform::WaveformError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Host-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad key, path or number. Nothing changed.
    Validation,
    /// Unknown session key or missing file.
    NotFound,
    /// The concurrent player cap was reached.
    Capacity,
    /// Unsupported format or corrupt stream.
    Decode,
    /// Native failure; the session keeps its last good state.
    Platform,
    /// Recording stop rejected by the minimum duration guard.
    ShortRecording,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Decode => "decode",
            ErrorKind::Platform => "platform",
            ErrorKind::ShortRecording => "short_recording",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No session for key {0:?}")]
    SessionNotFound(String),

    #[error("Too many active players (max {max})")]
    Capacity { max: usize },

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Waveform error: {0}")]
    Waveform(#[from] WaveformError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Platform error: {0}")]
    Bridge(#[from] BridgeError),
}

fn bridge_kind(err: &BridgeError) -> ErrorKind {
    match err {
        BridgeError::NotFound(_) => ErrorKind::NotFound,
        BridgeError::Unsupported(_) | BridgeError::Decode(_) => ErrorKind::Decode,
        _ => ErrorKind::Platform,
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::SessionNotFound(_) => ErrorKind::NotFound,
            CoreError::Capacity { .. } => ErrorKind::Capacity,
            CoreError::CapabilityMissing { .. } => ErrorKind::Platform,
            CoreError::Runtime(err) => match err {
                core_runtime::Error::Config(_) | core_runtime::Error::InvalidSessionKey(_) => {
                    ErrorKind::Validation
                }
                core_runtime::Error::CapabilityMissing { .. } | core_runtime::Error::Internal(_) => {
                    ErrorKind::Platform
                }
            },
            CoreError::Playback(err) => match err {
                PlaybackError::InvalidArgument(_) | PlaybackError::NoTrackLoaded => {
                    ErrorKind::Validation
                }
                PlaybackError::FileNotFound(_) => ErrorKind::NotFound,
                PlaybackError::Backend(bridge) => bridge_kind(bridge),
                PlaybackError::SourceError(_) | PlaybackError::IoError(_) => ErrorKind::Platform,
                PlaybackError::InvalidFormat(_)
                | PlaybackError::FormatNotDecodable(_)
                | PlaybackError::DecodingError(_)
                | PlaybackError::CorruptedStream(_)
                | PlaybackError::DecoderError(_) => ErrorKind::Decode,
            },
            CoreError::Waveform(err) => match err {
                WaveformError::FileNotFound(_) => ErrorKind::NotFound,
                WaveformError::Decode(_) => ErrorKind::Decode,
                WaveformError::Validation(_) => ErrorKind::Validation,
            },
            CoreError::Recording(err) => match err {
                RecordingError::AlreadyActive | RecordingError::Validation(_) => {
                    ErrorKind::Validation
                }
                RecordingError::ShortRecording { .. } => ErrorKind::ShortRecording,
                RecordingError::PauseNotSupported | RecordingError::Platform(_) => {
                    ErrorKind::Platform
                }
            },
            CoreError::Bridge(err) => bridge_kind(err),
        }
    }

    pub fn is_capacity(&self) -> bool {
        self.kind() == ErrorKind::Capacity
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
