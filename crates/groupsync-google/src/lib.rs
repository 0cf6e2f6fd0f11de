//! Google Workspace Directory adapter for groupsync.
//!
//! Provides [`GoogleDirectoryClient`], an HTTP implementation of
//! [`groupsync_core::DirectoryApi`] over the Admin SDK Directory API, and the
//! service account plumbing it needs:
//!
//! - [`ServiceAccountKey`] loaded from a key file or inline JSON
//! - [`ServiceAccountTokenSource`] for domain-wide delegated OAuth2 tokens
//! - [`StaticTokenSource`] for pre-issued tokens
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use groupsync_google::{
//!     default_scopes, GoogleDirectoryClient, ServiceAccountKey, ServiceAccountTokenSource,
//! };
//!
//! # fn example() -> Result<(), groupsync_google::GoogleError> {
//! let key = ServiceAccountKey::from_file("/etc/groupsync/key.json")?;
//! let tokens = ServiceAccountTokenSource::new(key, "admin@example.com", default_scopes())?;
//! let client = GoogleDirectoryClient::new(Arc::new(tokens), Duration::from_secs(30))?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod credentials;
mod error;

pub use auth::{
    default_scopes, ServiceAccountTokenSource, StaticTokenSource, TokenSource, SCOPE_GROUP,
    SCOPE_GROUP_MEMBER,
};
pub use client::{
    map_error_response, GoogleApiError, GoogleApiErrorBody, GoogleApiErrorDetail,
    GoogleDirectoryClient, DEFAULT_BASE_URL, MAX_RESULTS, MY_CUSTOMER,
};
pub use credentials::{ServiceAccountKey, DEFAULT_TOKEN_URI};
pub use error::{GoogleError, GoogleResult};
