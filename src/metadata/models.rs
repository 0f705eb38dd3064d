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


//! Download status lifecycle and the persisted per-video record

use crate::error::{Result, SyncError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of a single video's local copy
///
/// NEW is also the implicit state of any video with no stored record.
/// FAILED persists until a retry is explicitly requested; nothing in this
/// crate retries automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "downloaded")]
    Downloaded,
    #[serde(rename = "failed")]
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::New => "new",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(DownloadStatus::New),
            "downloading" => Ok(DownloadStatus::Downloading),
            "downloaded" => Ok(DownloadStatus::Downloaded),
            "failed" => Ok(DownloadStatus::Failed),
            _ => Err(SyncError::validation(format!("invalid download status: {s}"))),
        }
    }
}

/// Persisted download state for one video, keyed by video id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVideoState {
    pub status: DownloadStatus,

    /// 0–100; monotone within a single attempt, reset to 0 on retry
    pub download_progress_percent: u8,

    /// Set only once the video is fully on disk
    pub local_file_path: Option<PathBuf>,

    pub downloaded_at_ms: Option<i64>,
    pub failed_at_ms: Option<i64>,
    pub error_message: Option<String>,
    pub updated_at_ms: i64,
}

impl LocalVideoState {
    /// The state of a video we have never attempted: what the UI sees for
    /// catalog entries with no stored record. Not persisted as-is.
    pub fn synthetic_new() -> Self {
        Self {
            status: DownloadStatus::New,
            download_progress_percent: 0,
            local_file_path: None,
            downloaded_at_ms: None,
            failed_at_ms: None,
            error_message: None,
            updated_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Fresh record for a starting attempt; also what a retry resets to
    pub fn downloading_now() -> Self {
        Self {
            status: DownloadStatus::Downloading,
            ..Self::synthetic_new()
        }
    }

    /// Apply a status transition with its side effects.
    ///
    /// DOWNLOADED pins progress to 100 and clears failure fields; FAILED
    /// stamps `failed_at_ms` and clears `downloaded_at_ms`; DOWNLOADING
    /// optimistically clears failure fields; NEW resets the record to an
    /// untouched state (the demotion path for records whose file vanished).
    pub fn apply_status(&mut self, status: DownloadStatus) {
        let now = Utc::now().timestamp_millis();
        match status {
            DownloadStatus::Downloaded => {
                self.download_progress_percent = 100;
                self.downloaded_at_ms = Some(now);
                self.failed_at_ms = None;
                self.error_message = None;
            }
            DownloadStatus::Failed => {
                self.failed_at_ms = Some(now);
                self.downloaded_at_ms = None;
            }
            DownloadStatus::Downloading => {
                self.failed_at_ms = None;
                self.error_message = None;
            }
            DownloadStatus::New => {
                self.download_progress_percent = 0;
                self.local_file_path = None;
                self.downloaded_at_ms = None;
                self.failed_at_ms = None;
                self.error_message = None;
            }
        }
        self.status = status;
        self.updated_at_ms = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            DownloadStatus::New,
            DownloadStatus::Downloading,
            DownloadStatus::Downloaded,
            DownloadStatus::Failed,
        ] {
            assert_eq!(DownloadStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(DownloadStatus::parse("paused").is_err());
    }

    #[test]
    fn test_downloaded_transition_pins_progress_and_clears_failure() {
        let mut state = LocalVideoState::downloading_now();
        state.download_progress_percent = 73;
        state.failed_at_ms = Some(1);
        state.error_message = Some("old".to_string());

        state.apply_status(DownloadStatus::Downloaded);

        assert_eq!(state.download_progress_percent, 100);
        assert!(state.downloaded_at_ms.is_some());
        assert!(state.failed_at_ms.is_none());
        assert!(state.error_message.is_none());
    }

    #[test]
    fn test_failed_transition_clears_downloaded_at() {
        let mut state = LocalVideoState::downloading_now();
        state.apply_status(DownloadStatus::Downloaded);
        state.apply_status(DownloadStatus::Failed);

        assert!(state.downloaded_at_ms.is_none());
        assert!(state.failed_at_ms.is_some());
    }

    #[test]
    fn test_demotion_to_new_resets_record() {
        let mut state = LocalVideoState::downloading_now();
        state.apply_status(DownloadStatus::Downloaded);
        state.local_file_path = Some(PathBuf::from("/videos/video_9.mp4"));

        state.apply_status(DownloadStatus::New);

        assert_eq!(state.download_progress_percent, 0);
        assert!(state.local_file_path.is_none());
        assert!(state.downloaded_at_ms.is_none());
    }
}
