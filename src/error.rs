//! Error types for the offline download core
//!
//! This module defines error types using thiserror for ergonomic error
//! handling. Errors are categorized by domain (validation, storage,
//! network, filesystem, coordinator state) so callers can decide between
//! surfacing, retrying, and degrading.
//!
//! Two conventions hold across the crate:
//! - "busy" is not an error: operations that reject because a download is
//!   already active return `Ok(false)`, never `Err(_)`, so the UI can show
//!   an in-progress notice instead of crashing.
//! - a single video's failure is always converted into a FAILED status
//!   transition inside the queue-drain loop; it never escapes the batch.

use crate::catalog::VideoId;
use thiserror::Error;

/// Result type alias using our SyncError type
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for the download and sync core
#[derive(Error, Debug)]
pub enum SyncError {
    // ===== Validation Errors =====

    /// Malformed input to a public operation (bad id, out-of-range progress)
    #[error("Validation failed: {0}")]
    Validation(String),

    // ===== Storage Errors =====

    /// The storage port failed a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// No metadata record exists for the given video id
    #[error("No local record for video {0}")]
    RecordNotFound(VideoId),

    // ===== Network Errors =====

    /// Network connectivity or transfer error
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Generic download failure
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Server returned a non-success status code
    #[error("Server responded with status {status_code} for {url}")]
    UnexpectedStatusCode { status_code: u16, url: String },

    /// Download URL could not be parsed
    #[error("Invalid download URL: {0}")]
    InvalidDownloadUrl(String),

    /// No remote source could be resolved for the video
    #[error("No download source for video {0}")]
    MissingSource(VideoId),

    /// The transfer made no progress within the stall timeout
    #[error("Transfer stalled for {0} seconds")]
    Timeout(u64),

    // ===== Filesystem Errors =====

    /// Generic file I/O error
    #[error("File I/O error: {0}")]
    FileIo(String),

    /// Insufficient disk space for the requested batch
    #[error("Insufficient disk space (need {need} bytes, have {have} bytes)")]
    InsufficientDiskSpace { need: u64, have: u64 },

    // ===== Coordinator State Errors =====

    /// Coordinator state does not allow the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation was cancelled by the user
    #[error("Operation cancelled")]
    Cancelled,

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Helper methods for creating common errors
impl SyncError {
    /// Create a Validation error with a message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        SyncError::Validation(message.into())
    }

    /// Create a Storage error with a message
    pub fn storage<S: Into<String>>(message: S) -> Self {
        SyncError::Storage(message.into())
    }

    /// Create a Network error
    pub fn network<S: Into<String>>(message: S, is_transient: bool) -> Self {
        SyncError::Network {
            message: message.into(),
            is_transient,
        }
    }

    /// Create a FileIo error with a message
    pub fn file_io<S: Into<String>>(message: S) -> Self {
        SyncError::FileIo(message.into())
    }

    /// Check if error is retryable (transient network errors, stalls)
    ///
    /// Returns `true` for failures that might succeed if the user requests
    /// a retry: connectivity drops, stalled transfers, 5xx responses.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network { is_transient: true, .. }
                | SyncError::Timeout(_)
                | SyncError::UnexpectedStatusCode { status_code: 500..=599, .. }
        )
    }

    /// Check if error is related to file/disk operations
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            SyncError::FileIo(_) | SyncError::InsufficientDiskSpace { .. } | SyncError::Io(_)
        )
    }
}
