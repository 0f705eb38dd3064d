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


//! Narrow interfaces to the host platform
//!
//! The core consumes exactly three external capabilities: a durable
//! key→JSON store, a filesystem, and an HTTP downloader with a
//! connectivity probe. Each is a small async trait so the host app (or a
//! test) can supply its own engine; default adapters backed by files,
//! tokio::fs and reqwest live alongside the traits.

pub mod filesystem;
pub mod network;
pub mod storage;

pub use filesystem::{FileStat, FileSystemPort, TokioFileSystem};
pub use network::{ByteProgress, DownloadOutcome, HttpNetwork, NetworkPort};
pub use storage::{JsonFileStorage, MemoryStorage, StoragePort};
