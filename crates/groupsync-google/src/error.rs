//! Error types for the Google Directory adapter.

use groupsync_core::SyncError;
use thiserror::Error;

/// Result type alias using `GoogleError`.
pub type GoogleResult<T> = Result<T, GoogleError>;

/// Errors raised while loading credentials or acquiring access tokens.
///
/// Directory API responses are mapped straight to [`SyncError`]; this type
/// covers everything that happens before a request can be authorized.
#[derive(Debug, Error)]
pub enum GoogleError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service account key is missing or malformed.
    #[error("Invalid service account credentials: {0}")]
    Credentials(String),

    /// Signing the token assertion failed.
    #[error("Failed to sign token assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint rejected the assertion.
    #[error("Token request failed with status {status}: {message}")]
    TokenRequest { status: u16, message: String },

    /// Token response could not be parsed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credential file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<GoogleError> for SyncError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::Config(msg) => SyncError::Config(msg),
            GoogleError::TokenRequest { status, message } => match status {
                429 => SyncError::RateLimited {
                    retry_after_secs: None,
                    message,
                },
                500..=599 => SyncError::Transient { status, message },
                _ => SyncError::Auth(format!(
                    "token request failed with status {status}: {message}"
                )),
            },
            GoogleError::Http(e) => SyncError::Transport(e.to_string()),
            other => SyncError::Auth(other.to_string()),
        }
    }
}
