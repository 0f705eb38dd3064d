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


//! Sequential download coordination
//!
//! One coordinator per process, one transfer in flight at a time. The
//! queue drains in ascending id order; progress and status changes are
//! published on a broadcast channel any number of consumers can subscribe
//! to.

pub mod coordinator;
pub mod events;

pub use coordinator::DownloadCoordinator;
pub use events::{DownloadEvent, DownloadEvents};
