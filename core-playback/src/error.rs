//! # Playback Error Types
//!
//! Errors raised by the symphonia decoder adapter and by player sessions.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during decoding or player session operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The audio file does not exist or cannot be opened.
    #[error("File does not exist: {0}")]
    FileNotFound(String),

    /// Failed to open or read audio source.
    #[error("Failed to open audio source: {0}")]
    SourceError(String),

    /// Caller supplied an unusable argument (empty path, bad volume, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Audio format is not recognized or cannot be parsed.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Audio format was detected but cannot be decoded.
    #[error("Cannot decode audio format: {0}")]
    FormatNotDecodable(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Error occurred while reading packets.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Audio stream is corrupted or contains invalid data.
    #[error("Corrupted audio stream: {0}")]
    CorruptedStream(String),

    /// Decoder encountered an internal error.
    #[error("Decoder internal error: {0}")]
    DecoderError(String),

    // ========================================================================
    // Player Errors
    // ========================================================================
    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// The native playback backend rejected an operation.
    #[error("Playback backend error: {0}")]
    Backend(#[from] BridgeError),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PlaybackError {
    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidFormat(_)
                | PlaybackError::FormatNotDecodable(_)
                | PlaybackError::DecodingError(_)
                | PlaybackError::CorruptedStream(_)
                | PlaybackError::DecoderError(_)
        )
    }

    /// Returns `true` when the underlying file is missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            PlaybackError::FileNotFound(_) => true,
            PlaybackError::Backend(err) => err.is_not_found(),
            PlaybackError::IoError(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Decoder failures cross the bridge boundary as [`BridgeError`] so that
/// consumers of `DecoderProvider` only see one error type.
impl From<PlaybackError> for BridgeError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::Backend(inner) => inner,
            PlaybackError::IoError(io) => BridgeError::Io(io),
            PlaybackError::FileNotFound(path) => BridgeError::NotFound(path),
            PlaybackError::InvalidFormat(msg) | PlaybackError::FormatNotDecodable(msg) => {
                BridgeError::Unsupported(msg)
            }
            other if other.is_format_error() => BridgeError::Decode(other.to_string()),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_bridge_not_found() {
        let bridged: BridgeError = PlaybackError::FileNotFound("a.wav".into()).into();
        assert!(bridged.is_not_found());
    }

    #[test]
    fn format_errors_map_to_decode_or_unsupported() {
        let bridged: BridgeError = PlaybackError::InvalidFormat("probe".into()).into();
        assert!(matches!(bridged, BridgeError::Unsupported(_)));

        let bridged: BridgeError = PlaybackError::CorruptedStream("packets".into()).into();
        assert!(matches!(bridged, BridgeError::Decode(_)));
    }

    #[test]
    fn backend_not_found_is_detected() {
        let err = PlaybackError::from(BridgeError::NotFound("gone.m4a".into()));
        assert!(err.is_not_found());
        assert!(!PlaybackError::NoTrackLoaded.is_not_found());
    }
}
