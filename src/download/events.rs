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


//! Download notifications
//!
//! A broadcast channel carries progress and status events to every
//! subscriber; registering a new listener never displaces an existing one.
//! Publishing with no subscribers is a no-op, not an error.

use crate::catalog::VideoId;
use crate::metadata::DownloadStatus;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A notification pushed out of the coordinator
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Transfer progress for the in-flight video
    Progress { video_id: VideoId, percent: u8 },

    /// A video's status changed; the path is set when it became DOWNLOADED
    Status {
        video_id: VideoId,
        status: DownloadStatus,
        local_file_path: Option<PathBuf>,
    },
}

/// Multi-subscriber event publisher
#[derive(Debug, Clone)]
pub struct DownloadEvents {
    tx: broadcast::Sender<DownloadEvent>,
}

impl DownloadEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Hand out a fresh receiver; each subscriber sees every event
    /// published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers, if any
    pub fn publish(&self, event: DownloadEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for DownloadEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multiple_subscribers_see_the_same_events() {
        let events = DownloadEvents::new();
        let mut a = events.subscribe();
        let mut b = events.subscribe();

        events.publish(DownloadEvent::Progress {
            video_id: 1,
            percent: 50,
        });

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                DownloadEvent::Progress { video_id, percent } => {
                    assert_eq!(video_id, 1);
                    assert_eq!(percent, 50);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let events = DownloadEvents::new();
        events.publish(DownloadEvent::Progress {
            video_id: 1,
            percent: 1,
        });
    }
}
