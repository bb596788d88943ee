//! # Recording Error Types

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordingError {
    /// `start` was called while a recording is running or paused.
    #[error("A recording is already in progress")]
    AlreadyActive,

    /// Rejected request fields (zero sample rate, bad file name pattern).
    #[error("Validation error: {0}")]
    Validation(String),

    /// `stop` was called before the minimum recorded duration elapsed.
    /// The recording keeps running.
    #[error("Recording too short: {elapsed_ms} ms recorded, at least {min_ms} ms required")]
    ShortRecording { elapsed_ms: u64, min_ms: u64 },

    /// The active encoder cannot pause.
    #[error("Pause is not supported by this recorder")]
    PauseNotSupported,

    /// The native recorder, path allocator or probe failed.
    #[error("Recorder platform error: {0}")]
    Platform(#[from] BridgeError),
}

impl RecordingError {
    /// Stable code reported to hosts.
    pub fn code(&self) -> &'static str {
        match self {
            RecordingError::AlreadyActive => "ALREADY_RECORDING",
            RecordingError::Validation(_) => "INVALID_ARGUMENT",
            RecordingError::ShortRecording { .. } => "SHORT_RECORDING",
            RecordingError::PauseNotSupported => "PAUSE_NOT_SUPPORTED",
            RecordingError::Platform(_) => "PLATFORM_ERROR",
        }
    }

    pub fn is_short_recording(&self) -> bool {
        matches!(self, RecordingError::ShortRecording { .. })
    }
}

pub type Result<T> = std::result::Result<T, RecordingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_recording_has_stable_code() {
        let err = RecordingError::ShortRecording {
            elapsed_ms: 120,
            min_ms: 500,
        };
        assert_eq!(err.code(), "SHORT_RECORDING");
        assert!(err.is_short_recording());
        assert!(err.to_string().contains("120 ms"));
    }

    #[test]
    fn bridge_errors_convert_to_platform() {
        let err: RecordingError = BridgeError::Device("no input device".into()).into();
        assert_eq!(err.code(), "PLATFORM_ERROR");
        assert!(!err.is_short_recording());
    }
}
