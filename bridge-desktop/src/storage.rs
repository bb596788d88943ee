//! Recordings directory on desktop platforms.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::PathAllocator;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

const APP_DIR: &str = "waveform-engine";
const RECORDINGS_DIR: &str = "recordings";

/// Allocates recording paths under the user's cache directory.
///
/// Resolution order: `dirs::cache_dir()`, then the system temp directory.
/// The directory is created on first use.
#[derive(Debug, Clone)]
pub struct DesktopPathAllocator {
    root: PathBuf,
}

impl DesktopPathAllocator {
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
            .join(RECORDINGS_DIR);
        Self { root }
    }

    /// Use `root` as the recordings directory.
    pub fn with_directory(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for DesktopPathAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PathAllocator for DesktopPathAllocator {
    async fn recordings_directory(&self) -> Result<PathBuf> {
        if fs::metadata(&self.root).await.is_err() {
            fs::create_dir_all(&self.root).await.map_err(BridgeError::Io)?;
            debug!(path = ?self.root, "Created recordings directory");
        }
        Ok(self.root.clone())
    }

    async fn allocate(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(BridgeError::OperationFailed(format!(
                "invalid recording file name: {file_name:?}"
            )));
        }
        Ok(self.recordings_directory().await?.join(file_name))
    }
}
