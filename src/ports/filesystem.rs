// VidSync - Offline Video Client Core
// Copyright (C) 2026 VidSync contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Filesystem port
//!
//! Directory creation, existence checks, stat, delete and free-space
//! queries. Deleting an absent file succeeds, so callers can retry delete
//! paths without special-casing.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stat result for a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub size_bytes: u64,
}

/// Filesystem operations the core depends on
#[async_trait]
pub trait FileSystemPort: Send + Sync {
    /// Whether the path exists at all
    async fn exists(&self, path: &Path) -> bool;

    /// Stat a path; errors if it does not exist
    async fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Create a directory and any missing parents
    async fn mkdir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file; absent files succeed silently
    async fn unlink(&self, path: &Path) -> Result<()>;

    /// Free space in bytes on the volume containing `path`
    async fn free_space_bytes(&self, path: &Path) -> Result<u64>;

    /// List directory entries (full paths)
    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Default adapter over tokio::fs, with fs2 for free-space queries
#[derive(Debug, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystemPort for TokioFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let meta = fs::metadata(path)
            .await
            .map_err(|e| SyncError::file_io(format!("stat {}: {e}", path.display())))?;
        Ok(FileStat {
            is_file: meta.is_file(),
            is_directory: meta.is_dir(),
            size_bytes: meta.len(),
        })
    }

    async fn mkdir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| SyncError::file_io(format!("mkdir {}: {e}", path.display())))
    }

    async fn unlink(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::file_io(format!("delete {}: {e}", path.display()))),
        }
    }

    async fn free_space_bytes(&self, path: &Path) -> Result<u64> {
        // statvfs is fast but still a syscall against the mount table;
        // keep it off the async threads.
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            fs2::available_space(&path)
                .map_err(|e| SyncError::file_io(format!("free space {}: {e}", path.display())))
        })
        .await
        .map_err(|e| SyncError::file_io(format!("free space query aborted: {e}")))?
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(path)
            .await
            .map_err(|e| SyncError::file_io(format!("read dir {}: {e}", path.display())))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::file_io(format!("read dir {}: {e}", path.display())))?
        {
            out.push(entry.path());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stat_and_exists() {
        let dir = TempDir::new().unwrap();
        let fs_port = TokioFileSystem::new();
        let file = dir.path().join("clip.mp4");

        assert!(!fs_port.exists(&file).await);
        tokio::fs::write(&file, b"0123456789").await.unwrap();

        assert!(fs_port.exists(&file).await);
        let stat = fs_port.stat(&file).await.unwrap();
        assert!(stat.is_file);
        assert!(!stat.is_directory);
        assert_eq!(stat.size_bytes, 10);
    }

    #[tokio::test]
    async fn test_unlink_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let fs_port = TokioFileSystem::new();
        let file = dir.path().join("gone.mp4");

        tokio::fs::write(&file, b"x").await.unwrap();
        fs_port.unlink(&file).await.unwrap();
        fs_port.unlink(&file).await.unwrap();
        assert!(!fs_port.exists(&file).await);
    }

    #[tokio::test]
    async fn test_free_space_reports_nonzero() {
        let dir = TempDir::new().unwrap();
        let fs_port = TokioFileSystem::new();
        let free = fs_port.free_space_bytes(dir.path()).await.unwrap();
        assert!(free > 0);
    }

    #[tokio::test]
    async fn test_mkdir_and_read_dir() {
        let dir = TempDir::new().unwrap();
        let fs_port = TokioFileSystem::new();
        let nested = dir.path().join("a/b/c");

        fs_port.mkdir_all(&nested).await.unwrap();
        tokio::fs::write(nested.join("one"), b"1").await.unwrap();

        let entries = fs_port.read_dir(&nested).await.unwrap();
        assert_eq!(entries.len(), 1);
    }
}
