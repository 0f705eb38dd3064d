//! Download configuration
//!
//! Owned by the composition root and passed by value into the coordinator.
//! Nothing in this crate reads configuration from globals.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum free space required before a batch may start, in kilobytes.
/// Roughly 1 GB; a hard product requirement, checked before any enqueue.
pub const MIN_FREE_SPACE_KB: u64 = 1_000_000;

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory downloaded videos are written to
    pub download_dir: PathBuf,

    /// Base endpoint used when a record carries no explicit source URL
    pub media_base_url: String,

    /// Minimum free disk space required to start a batch, in KB
    pub min_free_space_kb: u64,

    /// Pause between consecutive transfers. Insulates the filesystem and
    /// network layers between items; a stability measure, not correctness.
    pub inter_download_delay: Duration,

    /// Fail the transfer if no bytes arrive for this long
    pub stall_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            media_base_url: "https://media.example.com/api".to_string(),
            min_free_space_kb: MIN_FREE_SPACE_KB,
            inter_download_delay: Duration::from_millis(500),
            stall_timeout: Duration::from_secs(30),
        }
    }
}

impl DownloadConfig {
    /// Minimum free space in bytes
    pub fn min_free_space_bytes(&self) -> u64 {
        self.min_free_space_kb * 1024
    }
}
