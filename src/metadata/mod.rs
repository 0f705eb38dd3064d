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


//! Durable per-video download state
//!
//! Every locally-known video has a `LocalVideoState` record persisted
//! through the storage port, plus membership in an aggregate index so the
//! whole library can be read in one call. The store does no locking of its
//! own: the download coordinator is the only writer during an active batch
//! and serializes writes per id by construction.

pub mod models;
pub mod store;

pub use models::{DownloadStatus, LocalVideoState};
pub use store::VideoMetadataStore;
