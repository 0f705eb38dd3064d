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


//! Catalog reconciliation
//!
//! Compares a freshly fetched server catalog against the local metadata
//! store. Every server record is classified as new (no local record) or
//! existing (known locally, whatever its status); every local id absent
//! from the catalog is orphaned and eligible for cleanup. Cleanup is
//! best-effort per item: one video's failure never stops the pass.
//!
//! Callers must not run a cleanup pass concurrently with an active download
//! batch touching the same ids; the application sequences reconciliation
//! before each batch.

use crate::catalog::{VideoId, VideoRecord};
use crate::error::Result;
use crate::metadata::{DownloadStatus, LocalVideoState, VideoMetadataStore};
use crate::ports::FileSystemPort;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Explicit number formatting for report text. Passed in by the caller;
/// nothing here consults a global locale.
#[derive(Debug, Clone)]
pub struct NumberFormat {
    /// Thousands separator, e.g. `Some(',')` or `Some('\u{202f}')`
    pub grouping_separator: Option<char>,
}

impl NumberFormat {
    pub fn plain() -> Self {
        Self {
            grouping_separator: None,
        }
    }

    pub fn grouped(separator: char) -> Self {
        Self {
            grouping_separator: Some(separator),
        }
    }

    /// Render a count with the configured grouping
    pub fn format_count(&self, n: u64) -> String {
        let digits = n.to_string();
        let Some(sep) = self.grouping_separator else {
            return digits;
        };
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(sep);
            }
            out.push(ch);
        }
        out
    }
}

/// Outcome of one analysis pass over catalog vs. local state
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Server records with no local entry, in server-catalog order
    pub new_videos: Vec<VideoRecord>,

    /// Server records known locally (any status), in server-catalog order
    pub existing_videos: Vec<VideoRecord>,

    /// Orphaned local entries, ascending by id
    pub deleted_videos: Vec<(VideoId, LocalVideoState)>,

    /// True when there is anything to download or clean up
    pub sync_required: bool,
}

impl SyncReport {
    /// Human-readable one-line summary
    pub fn summary(&self, fmt: &NumberFormat) -> String {
        format!(
            "catalog sync: {} new, {} existing, {} deleted",
            fmt.format_count(self.new_videos.len() as u64),
            fmt.format_count(self.existing_videos.len() as u64),
            fmt.format_count(self.deleted_videos.len() as u64),
        )
    }
}

/// Outcome of a cleanup pass over orphaned videos
#[derive(Debug, Clone)]
pub struct CleanupResult {
    /// True only when every item succeeded in full
    pub success: bool,

    /// Items whose file delete and record removal both succeeded
    pub cleaned_count: usize,

    /// One entry per failed item
    pub errors: Vec<String>,
}

/// Options for a complete sync pass
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Run cleanup for orphaned videos after analysis
    pub auto_cleanup: bool,

    /// Report only; never mutates state even if `auto_cleanup` is set
    pub dry_run: bool,

    /// Formatting for the textual summary
    pub number_format: NumberFormat,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            auto_cleanup: true,
            dry_run: false,
            number_format: NumberFormat::plain(),
        }
    }
}

/// Result of [`CatalogReconciler::perform_complete_sync`]
#[derive(Debug, Clone)]
pub struct CompleteSyncOutcome {
    pub report: SyncReport,
    pub cleanup: Option<CleanupResult>,
    pub summary: String,
}

/// Classify every server record against local state.
///
/// Pure function: `new ∪ existing` equals the catalog (by id), `deleted`
/// is exactly the local ids missing from the catalog, and no id lands in
/// two buckets.
pub fn analyze(
    catalog: &[VideoRecord],
    local: &BTreeMap<VideoId, LocalVideoState>,
) -> SyncReport {
    let catalog_ids: HashSet<VideoId> = catalog.iter().map(|v| v.id).collect();

    let mut new_videos = Vec::new();
    let mut existing_videos = Vec::new();
    for record in catalog {
        if local.contains_key(&record.id) {
            existing_videos.push(record.clone());
        } else {
            new_videos.push(record.clone());
        }
    }

    let deleted_videos: Vec<(VideoId, LocalVideoState)> = local
        .iter()
        .filter(|(id, _)| !catalog_ids.contains(id))
        .map(|(id, state)| (*id, state.clone()))
        .collect();

    let sync_required = !new_videos.is_empty() || !deleted_videos.is_empty();

    SyncReport {
        new_videos,
        existing_videos,
        deleted_videos,
        sync_required,
    }
}

/// Reconciles server catalogs against the metadata store and cleans up
/// orphaned local state
pub struct CatalogReconciler {
    store: Arc<VideoMetadataStore>,
    fs: Arc<dyn FileSystemPort>,
}

impl CatalogReconciler {
    pub fn new(store: Arc<VideoMetadataStore>, fs: Arc<dyn FileSystemPort>) -> Self {
        Self { store, fs }
    }

    /// Demote DOWNLOADED records whose file has gone missing.
    ///
    /// A record claiming DOWNLOADED with no file on disk is treated as if
    /// the video was never downloaded: deliberate policy, not corruption
    /// handling. Returns how many records were demoted.
    pub async fn verify_downloaded_files(&self) -> Result<usize> {
        let all = self.store.get_all().await?;
        let mut demoted = 0;

        for (id, state) in all {
            if state.status != DownloadStatus::Downloaded {
                continue;
            }
            let present = match &state.local_file_path {
                Some(path) => self.fs.exists(path).await,
                None => false,
            };
            if !present {
                warn!(video_id = id, "downloaded file missing, demoting to new");
                self.store.update_status(id, DownloadStatus::New).await?;
                demoted += 1;
            }
        }

        Ok(demoted)
    }

    /// Best-effort cleanup of orphaned videos.
    ///
    /// For each entry: delete the local file if a path is recorded and the
    /// file exists, then unconditionally remove the metadata record.
    /// Failures are collected and the pass continues; `cleaned_count`
    /// counts only items where every step succeeded.
    pub async fn cleanup(&self, deleted: &[(VideoId, LocalVideoState)]) -> CleanupResult {
        let mut cleaned_count = 0;
        let mut errors = Vec::new();

        for (id, state) in deleted {
            let mut item_ok = true;

            if let Some(path) = &state.local_file_path {
                if self.fs.exists(path).await {
                    if let Err(e) = self.fs.unlink(path).await {
                        warn!(video_id = id, error = %e, "failed to delete orphaned file");
                        errors.push(format!("video {id}: file delete failed: {e}"));
                        item_ok = false;
                    }
                }
            }

            if let Err(e) = self.store.remove(*id).await {
                warn!(video_id = id, error = %e, "failed to remove orphaned record");
                errors.push(format!("video {id}: record removal failed: {e}"));
                item_ok = false;
            }

            if item_ok {
                cleaned_count += 1;
            }
        }

        CleanupResult {
            success: errors.is_empty(),
            cleaned_count,
            errors,
        }
    }

    /// Full reconciliation pass: verify on-disk files, analyze, optionally
    /// clean up, and produce a report. This is the entry point the rest of
    /// the system calls before starting a download batch.
    pub async fn perform_complete_sync(
        &self,
        catalog: &[VideoRecord],
        options: &SyncOptions,
    ) -> Result<CompleteSyncOutcome> {
        if !options.dry_run {
            self.verify_downloaded_files().await?;
        }

        let local = self.store.get_all().await?;
        let report = analyze(catalog, &local);

        let cleanup = if options.auto_cleanup && !options.dry_run && !report.deleted_videos.is_empty()
        {
            Some(self.cleanup(&report.deleted_videos).await)
        } else {
            None
        };

        let mut summary = report.summary(&options.number_format);
        match &cleanup {
            Some(result) => {
                summary.push_str(&format!(
                    " (cleaned {}, {} errors)",
                    options.number_format.format_count(result.cleaned_count as u64),
                    options.number_format.format_count(result.errors.len() as u64),
                ));
            }
            None if options.dry_run => summary.push_str(" (dry run)"),
            None => {}
        }

        info!(
            new = report.new_videos.len(),
            existing = report.existing_videos.len(),
            deleted = report.deleted_videos.len(),
            sync_required = report.sync_required,
            "reconciliation complete"
        );

        Ok(CompleteSyncOutcome {
            report,
            cleanup,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::ports::{FileStat, MemoryStorage};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    fn record(id: VideoId) -> VideoRecord {
        VideoRecord {
            id,
            name: format!("Video {id}"),
            remote_path: None,
            direct_url: None,
            file_size_bytes: 100,
            duration_seconds: 10,
            description: String::new(),
        }
    }

    fn downloaded(path: &str) -> LocalVideoState {
        let mut state = LocalVideoState::downloading_now();
        state.apply_status(DownloadStatus::Downloaded);
        state.local_file_path = Some(PathBuf::from(path));
        state
    }

    /// Scriptable filesystem: a set of "existing" paths and a set of paths
    /// whose deletion fails.
    #[derive(Default)]
    struct ScriptedFs {
        existing: Mutex<Vec<PathBuf>>,
        fail_unlink: Vec<PathBuf>,
    }

    impl ScriptedFs {
        fn with_files(paths: &[&str]) -> Self {
            Self {
                existing: Mutex::new(paths.iter().map(PathBuf::from).collect()),
                fail_unlink: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl FileSystemPort for ScriptedFs {
        async fn exists(&self, path: &Path) -> bool {
            self.existing.lock().unwrap().iter().any(|p| p == path)
        }
        async fn stat(&self, _path: &Path) -> crate::error::Result<FileStat> {
            Ok(FileStat {
                is_file: true,
                is_directory: false,
                size_bytes: 0,
            })
        }
        async fn mkdir_all(&self, _path: &Path) -> crate::error::Result<()> {
            Ok(())
        }
        async fn unlink(&self, path: &Path) -> crate::error::Result<()> {
            if self.fail_unlink.iter().any(|p| p == path) {
                return Err(SyncError::file_io("device busy"));
            }
            self.existing.lock().unwrap().retain(|p| p != path);
            Ok(())
        }
        async fn free_space_bytes(&self, _path: &Path) -> crate::error::Result<u64> {
            Ok(u64::MAX)
        }
        async fn read_dir(&self, _path: &Path) -> crate::error::Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    fn reconciler_with(
        fs: ScriptedFs,
    ) -> (CatalogReconciler, Arc<VideoMetadataStore>) {
        let store = Arc::new(VideoMetadataStore::new(Arc::new(MemoryStorage::new())));
        let reconciler = CatalogReconciler::new(Arc::clone(&store), Arc::new(fs));
        (reconciler, store)
    }

    #[test]
    fn test_analyze_new_existing_deleted() {
        // catalog [1,2,3], local {2} -> new=[1,3], existing=[2], deleted=[]
        let catalog = vec![record(1), record(2), record(3)];
        let mut local = BTreeMap::new();
        local.insert(2, downloaded("/v/2.mp4"));

        let report = analyze(&catalog, &local);
        let new_ids: Vec<_> = report.new_videos.iter().map(|v| v.id).collect();
        let existing_ids: Vec<_> = report.existing_videos.iter().map(|v| v.id).collect();

        assert_eq!(new_ids, vec![1, 3]);
        assert_eq!(existing_ids, vec![2]);
        assert!(report.deleted_videos.is_empty());
        assert!(report.sync_required);
    }

    #[test]
    fn test_analyze_detects_orphans() {
        // catalog [2], local {2,5} -> deleted=[5]
        let catalog = vec![record(2)];
        let mut local = BTreeMap::new();
        local.insert(2, downloaded("/v/2.mp4"));
        local.insert(5, downloaded("/v/5.mp4"));

        let report = analyze(&catalog, &local);
        assert!(report.new_videos.is_empty());
        assert_eq!(report.deleted_videos.len(), 1);
        assert_eq!(report.deleted_videos[0].0, 5);
        assert!(report.sync_required);
    }

    #[test]
    fn test_analyze_partition_is_complete_and_disjoint() {
        let catalog: Vec<_> = [4, 9, 1, 7].iter().map(|&id| record(id)).collect();
        let mut local = BTreeMap::new();
        for id in [9, 7, 12, 3] {
            local.insert(id, downloaded("/x"));
        }

        let report = analyze(&catalog, &local);

        let mut covered: Vec<_> = report
            .new_videos
            .iter()
            .chain(report.existing_videos.iter())
            .map(|v| v.id)
            .collect();
        covered.sort_unstable();
        assert_eq!(covered, vec![1, 4, 7, 9]);

        let deleted_ids: Vec<_> = report.deleted_videos.iter().map(|(id, _)| *id).collect();
        assert_eq!(deleted_ids, vec![3, 12]);

        let new_set: HashSet<_> = report.new_videos.iter().map(|v| v.id).collect();
        for v in &report.existing_videos {
            assert!(!new_set.contains(&v.id));
        }
    }

    #[test]
    fn test_analyze_nothing_to_do() {
        let catalog = vec![record(1)];
        let mut local = BTreeMap::new();
        local.insert(1, downloaded("/v/1.mp4"));

        let report = analyze(&catalog, &local);
        assert!(!report.sync_required);
    }

    #[tokio::test]
    async fn test_cleanup_removes_file_and_record() {
        let (reconciler, store) =
            reconciler_with(ScriptedFs::with_files(&["/v/5.mp4"]));
        store.save(5, &downloaded("/v/5.mp4")).await.unwrap();

        let result = reconciler
            .cleanup(&[(5, downloaded("/v/5.mp4"))])
            .await;

        assert!(result.success);
        assert_eq!(result.cleaned_count, 1);
        assert!(store.get(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_is_best_effort() {
        let mut fs = ScriptedFs::with_files(&["/v/1.mp4", "/v/2.mp4"]);
        fs.fail_unlink.push(PathBuf::from("/v/1.mp4"));
        let (reconciler, store) = reconciler_with(fs);
        store.save(1, &downloaded("/v/1.mp4")).await.unwrap();
        store.save(2, &downloaded("/v/2.mp4")).await.unwrap();

        let result = reconciler
            .cleanup(&[(1, downloaded("/v/1.mp4")), (2, downloaded("/v/2.mp4"))])
            .await;

        assert!(!result.success);
        assert_eq!(result.cleaned_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("video 1"));
        // The record goes regardless of the file delete outcome.
        assert!(store.get(1).await.unwrap().is_none());
        assert!(store.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_sync_with_auto_cleanup() {
        let (reconciler, store) =
            reconciler_with(ScriptedFs::with_files(&["/v/2.mp4", "/v/5.mp4"]));
        store.save(2, &downloaded("/v/2.mp4")).await.unwrap();
        store.save(5, &downloaded("/v/5.mp4")).await.unwrap();

        let outcome = reconciler
            .perform_complete_sync(&[record(2)], &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.report.deleted_videos.len(), 1);
        let cleanup = outcome.cleanup.unwrap();
        assert!(cleanup.success);
        assert_eq!(cleanup.cleaned_count, 1);
        assert!(store.get(5).await.unwrap().is_none());
        assert!(store.get(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        let (reconciler, store) =
            reconciler_with(ScriptedFs::with_files(&["/v/5.mp4"]));
        store.save(5, &downloaded("/v/5.mp4")).await.unwrap();

        let options = SyncOptions {
            auto_cleanup: true,
            dry_run: true,
            number_format: NumberFormat::plain(),
        };
        let outcome = reconciler
            .perform_complete_sync(&[], &options)
            .await
            .unwrap();

        assert!(outcome.cleanup.is_none());
        assert!(outcome.summary.ends_with("(dry run)"));
        assert!(store.get(5).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_file_demotes_to_new() {
        // Record says downloaded but the file is gone.
        let (reconciler, store) = reconciler_with(ScriptedFs::with_files(&[]));
        store.save(8, &downloaded("/v/8.mp4")).await.unwrap();

        let demoted = reconciler.verify_downloaded_files().await.unwrap();
        assert_eq!(demoted, 1);

        let state = store.get(8).await.unwrap().unwrap();
        assert_eq!(state.status, DownloadStatus::New);
        assert!(state.local_file_path.is_none());
        assert_eq!(state.download_progress_percent, 0);
    }

    #[test]
    fn test_number_format_grouping() {
        assert_eq!(NumberFormat::plain().format_count(1234567), "1234567");
        assert_eq!(NumberFormat::grouped(',').format_count(1234567), "1,234,567");
        assert_eq!(NumberFormat::grouped('.').format_count(999), "999");
        assert_eq!(NumberFormat::grouped(',').format_count(1000), "1,000");
    }
}
