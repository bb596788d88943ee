//! # Session Vocabulary
//!
//! Types shared by every session kind: the opaque [`SessionKey`] that groups
//! player and extraction state, the finish policy applied at end of stream,
//! the ticker frequency presets and the externally visible state enums.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Session Key
// ============================================================================

/// Opaque identifier for one player or extraction session.
///
/// Keys are supplied by the host (one per rendered waveform) and must be
/// non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Validate and wrap a host-provided key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSessionKey`] for empty or whitespace-only keys.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidSessionKey(key));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Finish Mode
// ============================================================================

/// What a player does when its track plays through to the end.
///
/// Also used as the `finish_type` payload of the finished event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishMode {
    /// Rewind and keep playing.
    Loop,
    /// Rewind and pause.
    Pause,
    /// Release the track and stop.
    #[default]
    Stop,
}

impl FinishMode {
    /// Host wire code: 0 = loop, 1 = pause, 2 = stop.
    pub fn code(self) -> u8 {
        match self {
            FinishMode::Loop => 0,
            FinishMode::Pause => 1,
            FinishMode::Stop => 2,
        }
    }

    /// Decode a host wire code. Unknown codes fall back to [`FinishMode::Stop`].
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FinishMode::Loop,
            1 => FinishMode::Pause,
            _ => FinishMode::Stop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinishMode::Loop => "loop",
            FinishMode::Pause => "pause",
            FinishMode::Stop => "stop",
        }
    }
}

impl fmt::Display for FinishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Update Frequency
// ============================================================================

/// Ticker presets. The concrete periods come from
/// [`UpdateIntervals`](crate::config::UpdateIntervals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    High,
    #[default]
    Medium,
    Low,
}

impl FromStr for UpdateFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(UpdateFrequency::High),
            "medium" => Ok(UpdateFrequency::Medium),
            "low" => Ok(UpdateFrequency::Low),
            other => Err(Error::Config(format!("Unknown update frequency: {other}"))),
        }
    }
}

// ============================================================================
// Duration Type
// ============================================================================

/// Which duration `get_duration` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationType {
    /// Current playback position.
    Current,
    /// Full track length.
    Max,
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlayerState {
    pub fn is_active(&self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Stopped => "stopped",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    #[default]
    Stopped,
    Recording,
    Paused,
}

impl RecorderState {
    pub fn is_active(&self) -> bool {
        matches!(self, RecorderState::Recording | RecorderState::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecorderState::Stopped => "stopped",
            RecorderState::Recording => "recording",
            RecorderState::Paused => "paused",
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_rejects_blank() {
        assert!(SessionKey::new("").is_err());
        assert!(SessionKey::new("   ").is_err());
        let key: SessionKey = "player-1".parse().unwrap();
        assert_eq!(key.as_str(), "player-1");
        assert_eq!(key.to_string(), "player-1");
    }

    #[test]
    fn session_key_serializes_as_plain_string() {
        let key = SessionKey::new("a").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"a\"");
    }

    #[test]
    fn finish_mode_codes() {
        assert_eq!(FinishMode::from_code(0), FinishMode::Loop);
        assert_eq!(FinishMode::from_code(1), FinishMode::Pause);
        assert_eq!(FinishMode::from_code(2), FinishMode::Stop);
        assert_eq!(FinishMode::from_code(42), FinishMode::Stop);
        assert_eq!(FinishMode::Pause.code(), 1);
        assert_eq!(FinishMode::default(), FinishMode::Stop);
    }

    #[test]
    fn update_frequency_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<UpdateFrequency>().unwrap(), UpdateFrequency::High);
        assert!("fast".parse::<UpdateFrequency>().is_err());
    }

    #[test]
    fn state_activity() {
        assert!(PlayerState::Paused.is_active());
        assert!(!PlayerState::Stopped.is_active());
        assert!(RecorderState::Recording.is_active());
        assert_eq!(RecorderState::Paused.to_string(), "paused");
    }
}
