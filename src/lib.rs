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


//! VidSync core: the offline download and synchronization engine of an
//! offline-first video client.
//!
//! The crate owns three cooperating components behind swappable ports:
//!
//! - [`metadata::VideoMetadataStore`]: durable per-video download state
//! - [`reconcile::CatalogReconciler`]: diffs the remote catalog against
//!   local state and cleans up videos the server removed
//! - [`download::DownloadCoordinator`]: the sequential download queue
//!
//! Side effects flow through the [`ports`] traits (storage, filesystem,
//! network), so the host wires in real adapters in production and scripted
//! ones in tests. The composition root constructs one store, one
//! reconciler and one coordinator, and calls
//! [`metadata::VideoMetadataStore::recover_interrupted`] before the first
//! batch.

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod metadata;
pub mod ports;
pub mod reconcile;

pub use catalog::{merge_catalog, MergedVideo, VideoId, VideoRecord};
pub use config::{DownloadConfig, MIN_FREE_SPACE_KB};
pub use download::{DownloadCoordinator, DownloadEvent, DownloadEvents};
pub use error::{Result, SyncError};
pub use metadata::{DownloadStatus, LocalVideoState, VideoMetadataStore};
pub use reconcile::{
    CatalogReconciler, CleanupResult, CompleteSyncOutcome, NumberFormat, SyncOptions, SyncReport,
};
