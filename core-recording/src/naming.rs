//! Auto-generated recording file names.
//!
//! A recording started without an explicit path is named after the local
//! start time, formatted with a strftime pattern (default
//! `%d-%m-%y-%H-%M-%S`), plus the extension of the chosen output format.

use crate::error::{RecordingError, Result};
use bridge_traits::recording::OutputFormat;
use bridge_traits::time::Clock;
use chrono::format::{Item, StrftimeItems};

/// Check that `pattern` is a usable strftime pattern for file names.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(RecordingError::Validation(
            "file name pattern is empty".to_string(),
        ));
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(RecordingError::Validation(format!(
            "invalid file name pattern: {pattern}"
        )));
    }
    if pattern.contains(['/', '\\']) {
        return Err(RecordingError::Validation(format!(
            "file name pattern must not contain separators: {pattern}"
        )));
    }
    Ok(())
}

/// `<local time formatted with pattern>.<extension>`.
pub fn auto_file_name(clock: &dyn Clock, pattern: &str, format: OutputFormat) -> Result<String> {
    validate_pattern(pattern)?;
    let stamp = clock.local_now().format(pattern);
    Ok(format!("{stamp}.{}", format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap())
    }

    #[test]
    fn name_uses_local_time_and_extension() {
        let clock = clock();
        let name = auto_file_name(&clock, "%d-%m-%y-%H-%M-%S", OutputFormat::Mpeg4).unwrap();

        let expected = format!("{}.m4a", clock.local_now().format("%d-%m-%y-%H-%M-%S"));
        assert_eq!(name, expected);
        assert!(name.ends_with(".m4a"));
    }

    #[test]
    fn extension_follows_output_format() {
        let name = auto_file_name(&clock(), "%Y", OutputFormat::Wav).unwrap();
        assert!(name.ends_with(".wav"));
        let name = auto_file_name(&clock(), "%Y", OutputFormat::ThreeGpp).unwrap();
        assert!(name.ends_with(".3gp"));
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(validate_pattern("").is_err());
        assert!(validate_pattern("%Q").is_err());
        assert!(validate_pattern("%Y/%m").is_err());
        assert!(validate_pattern("rec-%H%M%S").is_ok());
    }
}
