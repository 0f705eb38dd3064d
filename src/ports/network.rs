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


//! Network port: streaming HTTP download with progress and cancellation
//!
//! The transfer streams the response body to the destination path chunk by
//! chunk, invoking the progress callback with (bytes_written,
//! content_length) after each chunk. Cancellation is a oneshot signal
//! raced against the stream; a stalled stream (no chunk within the stall
//! timeout) fails like any other transfer error.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::oneshot;

/// Write buffer size for the destination file, 8KB chunks
const DOWNLOAD_BUFF_SZ: usize = 8 * 1024;

/// Progress callback: (bytes_written, content_length). Content length is 0
/// when the server did not report one.
pub type ByteProgress = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Result of a completed transfer
#[derive(Debug, Clone, Copy)]
pub struct DownloadOutcome {
    pub status_code: u16,
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// HTTP download capability plus a connectivity probe
#[async_trait]
pub trait NetworkPort: Send + Sync {
    /// Stream `url` to `dest`, reporting progress per chunk.
    ///
    /// A non-success status code is returned in the outcome without
    /// touching `dest`; the caller decides how to treat it. Cancellation
    /// surfaces as `SyncError::Cancelled`, a stall as `SyncError::Timeout`.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ByteProgress,
        cancel: oneshot::Receiver<()>,
    ) -> Result<DownloadOutcome>;

    /// Cheap connectivity check
    async fn is_reachable(&self) -> bool;
}

/// Default adapter over reqwest
pub struct HttpNetwork {
    client: Client,
    probe_url: String,
    stall_timeout: Duration,
}

impl HttpNetwork {
    /// Create the adapter. `probe_url` is the endpoint used by the
    /// connectivity check, typically the catalog API root.
    pub fn new(probe_url: String, stall_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            probe_url,
            stall_timeout,
        })
    }
}

#[async_trait]
impl NetworkPort for HttpNetwork {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ByteProgress,
        mut cancel: oneshot::Receiver<()>,
    ) -> Result<DownloadOutcome> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::network(format!("request failed: {e}"), true))?;

        let status = response.status();
        let outcome = DownloadOutcome {
            status_code: status.as_u16(),
        };
        if !outcome.is_success() {
            // Do not create a destination file for error responses.
            return Ok(outcome);
        }

        let content_length = response.content_length().unwrap_or(0);
        let file = File::create(dest)
            .await
            .map_err(|e| SyncError::file_io(format!("create {}: {e}", dest.display())))?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFF_SZ, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let next = tokio::select! {
                chunk = tokio::time::timeout(self.stall_timeout, stream.next()) => {
                    match chunk {
                        Ok(c) => c,
                        Err(_) => return Err(SyncError::Timeout(self.stall_timeout.as_secs())),
                    }
                }
                _ = &mut cancel => {
                    let _ = writer.flush().await;
                    return Err(SyncError::Cancelled);
                }
            };

            let Some(chunk) = next else { break };
            let chunk =
                chunk.map_err(|e| SyncError::network(format!("stream error: {e}"), true))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| SyncError::file_io(format!("write {}: {e}", dest.display())))?;
            written += chunk.len() as u64;
            on_progress(written, content_length);
        }

        writer
            .flush()
            .await
            .map_err(|e| SyncError::file_io(format!("flush {}: {e}", dest.display())))?;

        Ok(outcome)
    }

    async fn is_reachable(&self) -> bool {
        self.client
            .head(&self.probe_url)
            .send()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_stalled_stream_fails_with_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Serve headers plus one body chunk, then go quiet with the socket
        // still open so the client keeps waiting for the rest.
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhello")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(sock);
        });

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("stalled.mp4");
        let network =
            HttpNetwork::new(format!("http://{addr}/"), Duration::from_millis(200)).unwrap();
        let (_cancel_tx, cancel_rx) = oneshot::channel();

        let err = network
            .download(
                &format!("http://{addr}/videos/1/download"),
                &dest,
                Box::new(|_, _| {}),
                cancel_rx,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Timeout(_)));
    }
}
