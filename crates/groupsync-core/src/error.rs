//! Error types for directory synchronization.
//!
//! Errors carry enough classification for the retry policy and the merge
//! engine to decide between retrying, absorbing and propagating.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reading or provisioning directory state.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The remote API throttled the request.
    #[error("rate limited (retry after {retry_after_secs:?}s): {message}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },

    /// Transient server-side failure (5xx).
    #[error("transient server error {status}: {message}")]
    Transient { status: u16, message: String },

    /// Network-level failure (connect, timeout, broken body).
    #[error("transport error: {0}")]
    Transport(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resource already exists (duplicate group or member).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authentication or authorization failure.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Any other non-success API response.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response or input could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A source group key cannot be mapped to a target group email.
    #[error("invalid group key '{key}': {reason}")]
    InvalidGroupKey { key: String, reason: String },

    /// The source directory could not be read.
    #[error("source directory error: {0}")]
    Source(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The run was cancelled before the operation could complete.
    #[error("operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether the failure is worth retrying with backoff.
    ///
    /// Rate limits, transient server errors and transport failures are
    /// retryable. Not-found, conflicts, auth and client errors are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transient { .. } | Self::Transport(_)
        )
    }

    /// Server-provided wait before the next attempt, from `Retry-After`.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Whether the remote reported the resource as absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the remote reported a duplicate resource.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
