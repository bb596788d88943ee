//! # Waveform Error Types

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaveformError {
    /// The audio file is missing or unreadable.
    #[error("File does not exist: {0}")]
    FileNotFound(String),

    /// Unsupported format, unknown length or a mid-stream decode failure.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Rejected arguments (zero points, empty path).
    #[error("Validation error: {0}")]
    Validation(String),
}

impl WaveformError {
    /// Classify a decoder bridge failure.
    pub fn from_bridge(err: BridgeError, file_name: &str) -> Self {
        if err.is_not_found() {
            WaveformError::FileNotFound(file_name.to_string())
        } else {
            WaveformError::Decode(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, WaveformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_errors_are_classified() {
        let err = WaveformError::from_bridge(BridgeError::NotFound("/a/b.wav".into()), "b.wav");
        assert!(matches!(err, WaveformError::FileNotFound(ref name) if name == "b.wav"));

        let err = WaveformError::from_bridge(BridgeError::Unsupported("midi".into()), "b.mid");
        assert!(matches!(err, WaveformError::Decode(_)));
    }
}
