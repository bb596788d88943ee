//! # Format Detection
//!
//! Probe hints and codec identification for symphonia.

use bridge_traits::playback::AudioCodec;
use std::path::Path;
use symphonia::core::codecs::CodecType;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Stateless helpers around symphonia's probe system.
pub struct FormatDetector;

impl FormatDetector {
    /// Probe hint from a file path's extension.
    ///
    /// ```rust
    /// use core_playback::FormatDetector;
    /// use std::path::Path;
    ///
    /// let _hint = FormatDetector::hint_from_path(Path::new("/recordings/take-1.m4a"));
    /// ```
    pub fn hint_from_path(path: &Path) -> Hint {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(extension) => Self::hint_from_extension(extension),
            None => {
                debug!("No file extension found, probe will auto-detect");
                Hint::new()
            }
        }
    }

    pub fn hint_from_extension(extension: &str) -> Hint {
        let mut hint = Hint::new();
        debug!("Setting probe hint extension: {}", extension);
        hint.with_extension(extension);
        hint
    }

    /// Map symphonia's codec type to the bridge codec enum.
    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        use symphonia::core::codecs::*;

        match codec_type {
            CODEC_TYPE_MP3 => AudioCodec::Mp3,
            CODEC_TYPE_AAC => AudioCodec::Aac,
            CODEC_TYPE_FLAC => AudioCodec::Flac,
            CODEC_TYPE_VORBIS => AudioCodec::Vorbis,
            CODEC_TYPE_OPUS => AudioCodec::Opus,
            CODEC_TYPE_ALAC => AudioCodec::Alac,
            CODEC_TYPE_PCM_S8
            | CODEC_TYPE_PCM_U8
            | CODEC_TYPE_PCM_S16LE
            | CODEC_TYPE_PCM_S16BE
            | CODEC_TYPE_PCM_S24LE
            | CODEC_TYPE_PCM_S24BE
            | CODEC_TYPE_PCM_S32LE
            | CODEC_TYPE_PCM_S32BE
            | CODEC_TYPE_PCM_F32LE
            | CODEC_TYPE_PCM_F32BE
            | CODEC_TYPE_PCM_F64LE
            | CODEC_TYPE_PCM_F64BE => AudioCodec::Wav,
            other => {
                warn!("Unknown codec type: {:?}", other);
                AudioCodec::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::codecs::{CODEC_TYPE_FLAC, CODEC_TYPE_NULL, CODEC_TYPE_PCM_F32LE};

    #[test]
    fn detects_known_codecs() {
        assert_eq!(FormatDetector::detect_codec(CODEC_TYPE_FLAC), AudioCodec::Flac);
        assert_eq!(FormatDetector::detect_codec(CODEC_TYPE_PCM_F32LE), AudioCodec::Wav);
        assert_eq!(FormatDetector::detect_codec(CODEC_TYPE_NULL), AudioCodec::Unknown);
    }

    #[test]
    fn hint_without_extension_does_not_panic() {
        let _ = FormatDetector::hint_from_path(Path::new("/recordings/untitled"));
    }
}
