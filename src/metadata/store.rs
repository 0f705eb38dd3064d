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


//! Video metadata store: durable CRUD plus the aggregate index
//!
//! Key layout through the storage port:
//! - `video.{id}`: one `LocalVideoState` document per video
//! - `video.index`: the full id→state map, so "all local videos" is one read
//!
//! The port gives single-key atomicity only, so cross-key consistency comes
//! from write ordering: on save the detail record lands before the index
//! entry, on remove the index entry goes before the detail record. Either
//! way a reader never observes an index entry without its detail record.

use crate::catalog::VideoId;
use crate::error::{Result, SyncError};
use crate::metadata::models::{DownloadStatus, LocalVideoState};
use crate::ports::StoragePort;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const INDEX_KEY: &str = "video.index";
const DETAIL_PREFIX: &str = "video.";

/// Durable CRUD for [`LocalVideoState`], keyed by video id
pub struct VideoMetadataStore {
    storage: Arc<dyn StoragePort>,
}

impl VideoMetadataStore {
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    fn detail_key(id: VideoId) -> String {
        format!("{DETAIL_PREFIX}{id}")
    }

    /// Persist a record and its index entry
    ///
    /// Validates the id and progress range up front. The detail write
    /// happens before the index write.
    pub async fn save(&self, id: VideoId, state: &LocalVideoState) -> Result<()> {
        if id == 0 {
            return Err(SyncError::validation("video id must be a positive integer"));
        }
        if state.download_progress_percent > 100 {
            return Err(SyncError::validation(format!(
                "progress {} out of range [0,100]",
                state.download_progress_percent
            )));
        }

        let value = serde_json::to_value(state)?;
        self.storage.set(&Self::detail_key(id), value).await?;

        let mut index = self.read_index().await?;
        index.insert(id, state.clone());
        self.write_index(&index).await?;

        debug!(video_id = id, status = state.status.as_str(), "saved video state");
        Ok(())
    }

    /// Read one record; `Ok(None)` for absence, never an error
    pub async fn get(&self, id: VideoId) -> Result<Option<LocalVideoState>> {
        match self.storage.get(&Self::detail_key(id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Read the full id→state map in one call
    ///
    /// The map is ordered by ascending id, which is also the enumeration
    /// order reconciliation reports deleted videos in.
    pub async fn get_all(&self) -> Result<BTreeMap<VideoId, LocalVideoState>> {
        self.read_index().await
    }

    /// Transition a record's status, applying the per-status side effects.
    ///
    /// Returns the updated record, or `Ok(None)` when no record exists;
    /// a partial record is never created here.
    pub async fn update_status(
        &self,
        id: VideoId,
        status: DownloadStatus,
    ) -> Result<Option<LocalVideoState>> {
        let Some(mut state) = self.get(id).await? else {
            return Ok(None);
        };
        state.apply_status(status);
        self.save(id, &state).await?;
        Ok(Some(state))
    }

    /// Update download progress; rejects percent outside [0,100]
    pub async fn update_progress(
        &self,
        id: VideoId,
        percent: u8,
    ) -> Result<Option<LocalVideoState>> {
        if percent > 100 {
            return Err(SyncError::validation(format!(
                "progress {percent} out of range [0,100]"
            )));
        }
        let Some(mut state) = self.get(id).await? else {
            return Ok(None);
        };
        state.download_progress_percent = percent;
        state.updated_at_ms = chrono::Utc::now().timestamp_millis();
        self.save(id, &state).await?;
        Ok(Some(state))
    }

    /// Delete a record and its index entry; absent ids succeed silently.
    /// The index entry goes first so no reader sees it dangling.
    pub async fn remove(&self, id: VideoId) -> Result<()> {
        let mut index = self.read_index().await?;
        if index.remove(&id).is_some() {
            self.write_index(&index).await?;
        }
        self.storage.remove(&Self::detail_key(id)).await?;
        Ok(())
    }

    /// Wipe every video record and the index. Maintenance/test tooling only.
    pub async fn clear(&self) -> Result<()> {
        for key in self.storage.list_keys().await? {
            if key.starts_with(DETAIL_PREFIX) {
                self.storage.remove(&key).await?;
            }
        }
        Ok(())
    }

    /// Demote stale DOWNLOADING records left behind by a crash or kill.
    ///
    /// Downloads are never resumed across process lifetimes: every record
    /// still marked DOWNLOADING at startup becomes FAILED with
    /// `error_message = "interrupted"`. Returns how many were demoted.
    /// Must run before any new batch starts.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let all = self.get_all().await?;
        let mut demoted = 0;

        for (id, state) in all {
            if state.status == DownloadStatus::Downloading {
                self.mark_failed(id, "interrupted").await?;
                demoted += 1;
            }
        }

        if demoted > 0 {
            info!(count = demoted, "demoted interrupted downloads to failed");
        }
        Ok(demoted)
    }

    /// Transition to DOWNLOADED and record where the file landed
    pub async fn mark_downloaded(&self, id: VideoId, path: PathBuf) -> Result<LocalVideoState> {
        let Some(mut state) = self.get(id).await? else {
            return Err(SyncError::RecordNotFound(id));
        };
        state.apply_status(DownloadStatus::Downloaded);
        state.local_file_path = Some(path);
        self.save(id, &state).await?;
        Ok(state)
    }

    /// Transition to FAILED with the captured error message
    pub async fn mark_failed(
        &self,
        id: VideoId,
        message: impl Into<String>,
    ) -> Result<LocalVideoState> {
        let Some(mut state) = self.get(id).await? else {
            return Err(SyncError::RecordNotFound(id));
        };
        state.apply_status(DownloadStatus::Failed);
        state.error_message = Some(message.into());
        self.save(id, &state).await?;
        Ok(state)
    }

    async fn read_index(&self) -> Result<BTreeMap<VideoId, LocalVideoState>> {
        match self.storage.get(INDEX_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn write_index(&self, index: &BTreeMap<VideoId, LocalVideoState>) -> Result<()> {
        self.storage.set(INDEX_KEY, serde_json::to_value(index)?).await
    }
}
