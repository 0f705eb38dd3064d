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


//! Server catalog records and the merged view-model projection
//!
//! `VideoRecord` is what the catalog API returns: immutable as received,
//! re-fetched whole on every sync pass, never mutated by the client.
//! `MergedVideo` joins a record with its local download state (or a
//! synthetic NEW state when nothing is stored); it drives both the
//! download queue and the UI list, and is recomputed rather than persisted.

use crate::metadata::{DownloadStatus, LocalVideoState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique server-assigned video identifier. Zero is never valid.
pub type VideoId = u64;

/// A video as described by the server catalog
///
/// Identity is `id`. Older catalog payloads carry the download location in
/// `direct_url`; newer ones use `remote_path`. Either may be absent, in
/// which case the coordinator constructs a URL from the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Unique video id
    pub id: VideoId,

    /// Display name
    pub name: String,

    /// Remote location of the media file (preferred source)
    #[serde(default)]
    pub remote_path: Option<String>,

    /// Legacy direct download URL, still emitted by older server versions
    #[serde(default)]
    pub direct_url: Option<String>,

    /// Size of the media file in bytes as reported by the server
    pub file_size_bytes: u64,

    /// Duration in seconds
    pub duration_seconds: u64,

    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// A catalog record joined with its local download state
///
/// Synthesized fresh on every sync pass; absence of a stored record shows
/// up as a NEW state with zero progress.
#[derive(Debug, Clone)]
pub struct MergedVideo {
    pub record: VideoRecord,
    pub local: LocalVideoState,
}

impl MergedVideo {
    /// Whether this video still needs a download attempt
    pub fn needs_download(&self) -> bool {
        matches!(self.local.status, DownloadStatus::New | DownloadStatus::Failed)
    }

    /// Whether the video is playable offline
    pub fn is_available_offline(&self) -> bool {
        self.local.status == DownloadStatus::Downloaded
    }
}

/// Join a server catalog with local state, preserving catalog order
pub fn merge_catalog(
    catalog: &[VideoRecord],
    local: &BTreeMap<VideoId, LocalVideoState>,
) -> Vec<MergedVideo> {
    catalog
        .iter()
        .map(|record| MergedVideo {
            record: record.clone(),
            local: local
                .get(&record.id)
                .cloned()
                .unwrap_or_else(LocalVideoState::synthetic_new),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn record(id: VideoId) -> VideoRecord {
        VideoRecord {
            id,
            name: format!("Video {id}"),
            remote_path: Some(format!("https://cdn.example.com/videos/{id}.mp4")),
            direct_url: None,
            file_size_bytes: 1_000_000,
            duration_seconds: 60,
            description: String::new(),
        }
    }

    #[test]
    fn test_merge_synthesizes_new_state() {
        let catalog = vec![record(1), record(2)];
        let mut local = BTreeMap::new();
        local.insert(2, LocalVideoState::downloading_now());

        let merged = merge_catalog(&catalog, &local);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].record.id, 1);
        assert_eq!(merged[0].local.status, DownloadStatus::New);
        assert!(merged[0].needs_download());
        assert_eq!(merged[1].local.status, DownloadStatus::Downloading);
        assert!(!merged[1].needs_download());
    }

    #[test]
    fn test_merge_preserves_catalog_order() {
        let catalog = vec![record(5), record(1), record(3)];
        let merged = merge_catalog(&catalog, &BTreeMap::new());
        let ids: Vec<_> = merged.iter().map(|m| m.record.id).collect();
        assert_eq!(ids, vec![5, 1, 3]);
    }

    #[test]
    fn test_legacy_catalog_payload_deserializes() {
        // Older servers emit direct_url and omit remote_path/description.
        let json = r#"{
            "id": 7,
            "name": "Intro",
            "direct_url": "https://old.example.com/7.mp4",
            "file_size_bytes": 4096,
            "duration_seconds": 12
        }"#;
        let rec: VideoRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.id, 7);
        assert!(rec.remote_path.is_none());
        assert_eq!(rec.direct_url.as_deref(), Some("https://old.example.com/7.mp4"));
        assert_eq!(rec.description, "");
    }
}
