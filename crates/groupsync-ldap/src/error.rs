//! Error types for the Active Directory source.

use groupsync_core::SyncError;
use thiserror::Error;

/// Result type alias using `LdapSourceError`.
pub type LdapResult<T> = Result<T, LdapSourceError>;

/// Errors that can occur while reading groups from Active Directory.
#[derive(Debug, Error)]
pub enum LdapSourceError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server could not be reached.
    #[error("Failed to connect to LDAP server at {url}: {message}")]
    Connection { url: String, message: String },

    /// Invalid bind credentials (result code 49).
    #[error("LDAP authentication failed for {bind_dn}")]
    AuthenticationFailed { bind_dn: String },

    /// Bind failed for another reason.
    #[error("LDAP bind failed with code {rc}: {text}")]
    Bind { rc: u32, text: String },

    /// A search could not be performed or returned an error result.
    #[error("LDAP search failed: {0}")]
    Search(String),
}

impl From<LdapSourceError> for SyncError {
    fn from(err: LdapSourceError) -> Self {
        match err {
            LdapSourceError::Config(msg) => SyncError::Config(msg),
            other => SyncError::Source(other.to_string()),
        }
    }
}
