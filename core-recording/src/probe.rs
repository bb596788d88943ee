//! Post-recording duration probe backed by `lofty`.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::recording::DurationProbe;
use lofty::file::AudioFile;
use lofty::probe::Probe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Reads the container's audio properties to find the recorded length.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyDurationProbe;

impl LoftyDurationProbe {
    pub fn new() -> Self {
        Self
    }

    fn read_duration(path: &Path) -> BridgeResult<Duration> {
        let tagged_file = Probe::open(path)
            .map_err(|e| BridgeError::Decode(format!("Failed to open file: {e}")))?
            .guess_file_type()
            .map_err(|e| BridgeError::Decode(format!("Failed to probe file: {e}")))?
            .read()
            .map_err(|e| BridgeError::Decode(format!("Failed to parse file: {e}")))?;

        Ok(tagged_file.properties().duration())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl DurationProbe for LoftyDurationProbe {
    async fn probe_duration(&self, path: &Path) -> BridgeResult<Duration> {
        if tokio::fs::metadata(path).await.is_err() {
            return Err(BridgeError::NotFound(path.display().to_string()));
        }

        let owned: PathBuf = path.to_path_buf();
        let duration = tokio::task::spawn_blocking(move || Self::read_duration(&owned))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Probe task failed: {e}")))??;

        debug!(path = %path.display(), duration_ms = duration.as_millis() as u64, "Probed recording");
        Ok(duration)
    }
}
