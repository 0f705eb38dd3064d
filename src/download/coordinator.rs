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


//! Download coordinator: the sequential queue-drain state machine
//!
//! At most one physical transfer is in flight per process: a product
//! requirement, enforced by the coordinator's own active flag under a
//! single mutex, independent of host concurrency. Both entry points
//! (`start_auto_download`, `retry_download`) check-and-set that flag while
//! holding the lock, so two callers can never start overlapping batches;
//! a batch already running is rejected with `Ok(false)`, never merged.
//!
//! Within one batch, videos download strictly in ascending id order, each
//! one completing (success or failure) before the next starts. An
//! individual video's failure is recorded and the loop moves on; only
//! cancellation or the up-front free-space check stops a batch early.
//!
//! The coordinator is an explicitly constructed, dependency-injected
//! service: the composition root creates exactly one and hands out
//! references. There is no global accessor.

use crate::catalog::{VideoId, VideoRecord};
use crate::config::DownloadConfig;
use crate::download::events::{DownloadEvent, DownloadEvents};
use crate::error::{Result, SyncError};
use crate::metadata::{DownloadStatus, LocalVideoState, VideoMetadataStore};
use crate::ports::{ByteProgress, FileSystemPort, NetworkPort};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long cancellation waits for the drain task to wind down
const CANCEL_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Mutable coordinator state, all behind one mutex so check-and-set on the
/// active flag is atomic with respect to every public operation.
#[derive(Default)]
struct CoordinatorState {
    /// A queue-drain loop is running
    active: bool,

    /// Pending videos, ascending by id
    queue: VecDeque<VideoRecord>,

    /// The video whose transfer is in flight right now
    current: Option<VideoRecord>,

    /// Signals the in-flight transfer to abort
    cancel_tx: Option<oneshot::Sender<()>>,

    /// Handle of the running drain task
    drain_handle: Option<JoinHandle<()>>,
}

/// Sequential download coordinator
pub struct DownloadCoordinator {
    config: DownloadConfig,
    store: Arc<VideoMetadataStore>,
    fs: Arc<dyn FileSystemPort>,
    network: Arc<dyn NetworkPort>,
    state: Arc<Mutex<CoordinatorState>>,
    events: DownloadEvents,
}

impl DownloadCoordinator {
    pub fn new(
        config: DownloadConfig,
        store: Arc<VideoMetadataStore>,
        fs: Arc<dyn FileSystemPort>,
        network: Arc<dyn NetworkPort>,
    ) -> Self {
        Self {
            config,
            store,
            fs,
            network,
            state: Arc::new(Mutex::new(CoordinatorState::default())),
            events: DownloadEvents::new(),
        }
    }

    /// Subscribe to progress and status notifications
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DownloadEvent> {
        self.events.subscribe()
    }

    /// Start downloading a batch of videos, lowest id first.
    ///
    /// Returns `Ok(false)` without side effects when a batch is already
    /// active (the existing queue is untouched) or when free disk space is
    /// below the configured minimum; an empty batch is vacuously complete
    /// and returns `Ok(true)` without starting anything, so `false` always
    /// means the batch was refused. Otherwise enqueues the sorted batch,
    /// spawns the drain loop and returns `Ok(true)` immediately; use
    /// [`subscribe`](Self::subscribe) or
    /// [`wait_until_idle`](Self::wait_until_idle) to follow completion.
    pub async fn start_auto_download(&self, mut videos: Vec<VideoRecord>) -> Result<bool> {
        let mut st = self.state.lock().await;
        if st.active {
            info!("download batch already active, rejecting new batch");
            return Ok(false);
        }
        if videos.is_empty() {
            debug!("empty batch, nothing to download");
            return Ok(true);
        }

        self.fs.mkdir_all(&self.config.download_dir).await?;
        let free = self.fs.free_space_bytes(&self.config.download_dir).await?;
        let need = self.config.min_free_space_bytes();
        if free < need {
            warn!(free, need, "insufficient disk space, refusing batch");
            return Ok(false);
        }

        videos.sort_by_key(|v| v.id);
        info!(count = videos.len(), "starting download batch");

        st.queue = videos.into();
        st.active = true;
        st.drain_handle = Some(self.spawn_drain());
        Ok(true)
    }

    /// Explicit user retry for a single video.
    ///
    /// Guarded by the same active-batch check as a full batch. Progress
    /// resets to zero for the new attempt.
    pub async fn retry_download(&self, video: VideoRecord) -> Result<bool> {
        let mut st = self.state.lock().await;
        if st.active {
            info!(video_id = video.id, "download active, rejecting retry");
            return Ok(false);
        }

        self.fs.mkdir_all(&self.config.download_dir).await?;
        info!(video_id = video.id, "retrying download");

        st.queue = VecDeque::from([video]);
        st.active = true;
        st.drain_handle = Some(self.spawn_drain());
        Ok(true)
    }

    /// Cancel the in-flight transfer and drop the entire pending queue.
    ///
    /// Cancellation is total: queued-but-not-started videos are dropped,
    /// the partial file of the current video is deleted, and its record is
    /// persisted as FAILED with `error_message = "cancelled"`. Returns
    /// `Ok(false)` when nothing is active.
    pub async fn cancel_current_download(&self) -> Result<bool> {
        let handle = {
            let mut st = self.state.lock().await;
            if !st.active {
                return Ok(false);
            }
            // Clear the queue before signalling so the drain loop cannot
            // pick up another item between the signal and the join.
            st.queue.clear();
            if let Some(tx) = st.cancel_tx.take() {
                let _ = tx.send(());
            }
            st.drain_handle.take()
        };

        if let Some(mut handle) = handle {
            if tokio::time::timeout(CANCEL_JOIN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                // The drain must be dead before the coordinator goes idle,
                // or a new batch would race the old worker.
                warn!("drain task did not stop within the cancel timeout, aborting it");
                handle.abort();
                let _ = handle.await;
            }
        }

        let mut st = self.state.lock().await;
        st.active = false;
        st.current = None;
        st.cancel_tx = None;
        info!("download batch cancelled");
        Ok(true)
    }

    /// Whether a batch is currently running
    pub async fn is_download_active(&self) -> bool {
        self.state.lock().await.active
    }

    /// The video whose transfer is in flight, if any
    pub async fn current_download(&self) -> Option<VideoRecord> {
        self.state.lock().await.current.clone()
    }

    /// Number of videos still waiting in the queue
    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Wait for the running drain loop, if any, to finish
    pub async fn wait_until_idle(&self) {
        let handle = self.state.lock().await.drain_handle.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // ========================================================================
    // Drain loop
    // ========================================================================

    fn spawn_drain(&self) -> JoinHandle<()> {
        let worker = Worker {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            fs: Arc::clone(&self.fs),
            network: Arc::clone(&self.network),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        };
        tokio::spawn(worker.drain())
    }
}

/// Everything the drain task needs, cloned out of the coordinator so the
/// task owns its context.
struct Worker {
    config: DownloadConfig,
    store: Arc<VideoMetadataStore>,
    fs: Arc<dyn FileSystemPort>,
    network: Arc<dyn NetworkPort>,
    state: Arc<Mutex<CoordinatorState>>,
    events: DownloadEvents,
}

impl Worker {
    /// Run the queue to completion. Only ever started through the
    /// coordinator's check-and-set, so a second drain can never be live
    /// alongside this one.
    async fn drain(self) {
        loop {
            let (video, cancel_rx) = {
                let mut st = self.state.lock().await;
                match st.queue.pop_front() {
                    Some(v) => {
                        st.current = Some(v.clone());
                        // Arm cancellation in the same critical section that
                        // claims the item, so a cancel issued at any point
                        // after this lock releases has a live signal path.
                        let (tx, rx) = oneshot::channel();
                        st.cancel_tx = Some(tx);
                        (v, rx)
                    }
                    None => {
                        st.active = false;
                        st.current = None;
                        break;
                    }
                }
            };

            if let Err(e) = self.download_one(&video, cancel_rx).await {
                // Bookkeeping failure (storage port down); the transfer
                // outcome itself is handled inside download_one.
                warn!(video_id = video.id, error = %e, "download bookkeeping failed");
                self.publish_status(video.id, DownloadStatus::Failed, None);
            }

            let more_queued = {
                let mut st = self.state.lock().await;
                st.current = None;
                st.cancel_tx = None;
                !st.queue.is_empty()
            };

            // Give the filesystem and network stack a beat between
            // transfers; stability, not correctness.
            if more_queued {
                tokio::time::sleep(self.config.inter_download_delay).await;
            }
        }
        debug!("download queue drained");
    }

    /// Download one video end to end, converting any transfer failure into
    /// a FAILED record. Only storage-level errors propagate.
    async fn download_one(
        &self,
        video: &VideoRecord,
        cancel_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        let id = video.id;

        self.store.save(id, &LocalVideoState::downloading_now()).await?;
        self.publish_status(id, DownloadStatus::Downloading, None);

        let dest = self.destination_path(id);
        match self.transfer(video, &dest, cancel_rx).await {
            Ok(()) => {
                let state = self.store.mark_downloaded(id, dest.clone()).await?;
                info!(video_id = id, path = %dest.display(), "download complete");
                self.publish_status(id, DownloadStatus::Downloaded, state.local_file_path);
            }
            Err(err) => {
                // Never leave a partial file behind.
                if let Err(e) = self.fs.unlink(&dest).await {
                    warn!(video_id = id, error = %e, "failed to remove partial file");
                }
                let message = match &err {
                    SyncError::Cancelled => "cancelled".to_string(),
                    other => other.to_string(),
                };
                warn!(video_id = id, error = %message, "download failed");
                self.store.mark_failed(id, message).await?;
                self.publish_status(id, DownloadStatus::Failed, None);
            }
        }
        Ok(())
    }

    /// Steps 3–5 of the per-video pipeline: resolve, short-circuit, stream.
    async fn transfer(
        &self,
        video: &VideoRecord,
        dest: &Path,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        let id = video.id;

        if cancel_requested(&mut cancel_rx) {
            return Err(SyncError::Cancelled);
        }

        let url = self.resolve_source(video)?;

        // Duplicate-enqueue guard: overlapping trigger sources (initial
        // load, pull-to-refresh) may both offer the same video. A file
        // already at the destination is accepted as downloaded without
        // re-verifying its size against the catalog.
        if self.fs.exists(dest).await {
            debug!(video_id = id, "destination file present, skipping transfer");
            return Ok(());
        }

        if !self.network.is_reachable().await {
            return Err(SyncError::network("no connectivity", true));
        }

        if cancel_requested(&mut cancel_rx) {
            return Err(SyncError::Cancelled);
        }

        // Progress flows through a channel so persistence and publishing
        // happen off the transfer's byte path. The forwarder only passes
        // strictly increasing percentages: monotone within this attempt.
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(u64, u64)>();
        let reported_size = video.file_size_bytes;
        let forwarder = {
            let store = Arc::clone(&self.store);
            let events = self.events.clone();
            tokio::spawn(async move {
                let mut last: i32 = -1;
                while let Some((written, content_length)) = progress_rx.recv().await {
                    let total = if content_length > 0 {
                        content_length
                    } else {
                        reported_size
                    };
                    let percent = percent_of(written, total);
                    if i32::from(percent) > last {
                        last = i32::from(percent);
                        if let Err(e) = store.update_progress(id, percent).await {
                            warn!(video_id = id, error = %e, "failed to persist progress");
                        }
                        events.publish(DownloadEvent::Progress {
                            video_id: id,
                            percent,
                        });
                    }
                }
                last
            })
        };

        let on_progress: ByteProgress = Box::new(move |written, total| {
            let _ = progress_tx.send((written, total));
        });
        let outcome = self.network.download(&url, dest, on_progress, cancel_rx).await;

        // The callback (and with it the channel sender) is gone once
        // download returns, so the forwarder terminates here.
        let last_percent = forwarder.await.unwrap_or(-1);

        let outcome = outcome?;
        if !outcome.is_success() {
            return Err(SyncError::UnexpectedStatusCode {
                status_code: outcome.status_code,
                url,
            });
        }
        if !self.fs.exists(dest).await {
            return Err(SyncError::DownloadFailed(
                "destination file missing after transfer".to_string(),
            ));
        }

        // A successful attempt always ends at exactly 100.
        if last_percent < 100 {
            if let Err(e) = self.store.update_progress(id, 100).await {
                warn!(video_id = id, error = %e, "failed to persist final progress");
            }
            self.events.publish(DownloadEvent::Progress {
                video_id: id,
                percent: 100,
            });
        }
        Ok(())
    }

    /// Resolve the remote source for a video: explicit remote path, then
    /// the legacy direct URL, then a constructed endpoint URL.
    fn resolve_source(&self, video: &VideoRecord) -> Result<String> {
        let explicit = video
            .remote_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| video.direct_url.as_deref().filter(|s| !s.is_empty()));

        let raw = match explicit {
            Some(s) => s.to_string(),
            None => {
                let base = self.config.media_base_url.trim_end_matches('/');
                if base.is_empty() {
                    return Err(SyncError::MissingSource(video.id));
                }
                format!("{base}/videos/{}/download", video.id)
            }
        };

        url::Url::parse(&raw).map_err(|_| SyncError::InvalidDownloadUrl(raw.clone()))?;
        Ok(raw)
    }

    fn destination_path(&self, id: VideoId) -> PathBuf {
        self.config.download_dir.join(format!("video_{id}.mp4"))
    }

    fn publish_status(&self, video_id: VideoId, status: DownloadStatus, path: Option<PathBuf>) {
        self.events.publish(DownloadEvent::Status {
            video_id,
            status,
            local_file_path: path,
        });
    }
}

/// Non-blocking check of the oneshot cancel signal. Only an actual `()`
/// counts; a dropped sender is the idle state, not a cancellation.
fn cancel_requested(rx: &mut oneshot::Receiver<()>) -> bool {
    matches!(rx.try_recv(), Ok(()))
}

/// Map byte counts to a 0–100 percentage, rounded and clamped
fn percent_of(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((written as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}
