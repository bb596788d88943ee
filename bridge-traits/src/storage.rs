//! Output path allocation.

use crate::{error::Result, platform::PlatformSendSync};
use std::path::PathBuf;

/// Resolves where new recordings are written.
///
/// Implementations pick a writable directory (sandboxed app storage on
/// mobile, a cache directory on desktop), create it when missing, and join
/// the requested file name onto it.
///
/// ```ignore
/// let path = allocator.allocate("17-10-26-09-41-02.m4a").await?;
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait PathAllocator: PlatformSendSync {
    /// Directory that holds auto-named recordings.
    async fn recordings_directory(&self) -> Result<PathBuf>;

    /// Full path for `file_name` inside [`recordings_directory`](Self::recordings_directory).
    async fn allocate(&self, file_name: &str) -> Result<PathBuf> {
        Ok(self.recordings_directory().await?.join(file_name))
    }
}
