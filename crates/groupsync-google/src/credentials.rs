//! Service account key loading.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::{GoogleError, GoogleResult};

/// Token endpoint used when the key file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Deserialize)]
struct RawServiceAccountKey {
    #[serde(rename = "type", default)]
    key_type: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    private_key: String,
    #[serde(default)]
    client_email: String,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

/// A Google service account key (the JSON key file contents).
///
/// The [`Debug`] impl redacts the private key to prevent accidental
/// credential exposure in log output.
#[derive(Clone)]
pub struct ServiceAccountKey {
    /// Project the account belongs to.
    pub project_id: Option<String>,
    /// Key ID, sent as the JWT `kid` header.
    pub private_key_id: Option<String>,
    /// PEM-encoded RSA private key.
    pub private_key: SecretString,
    /// Service account email; the JWT issuer.
    pub client_email: String,
    /// Numeric client ID.
    pub client_id: Option<String>,
    /// OAuth2 token endpoint.
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"[REDACTED]")
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse key file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, is not a service account
    /// key, or lacks `client_email` or `private_key`.
    pub fn from_json(json: &str) -> GoogleResult<Self> {
        let raw: RawServiceAccountKey = serde_json::from_str(json)?;

        if let Some(kind) = raw.key_type.as_deref() {
            if kind != "service_account" {
                return Err(GoogleError::Credentials(format!(
                    "expected key type 'service_account', got '{kind}'"
                )));
            }
        }
        if raw.client_email.trim().is_empty() {
            return Err(GoogleError::Credentials("client_email is missing".into()));
        }
        if raw.private_key.trim().is_empty() {
            return Err(GoogleError::Credentials("private_key is missing".into()));
        }

        Ok(Self {
            project_id: raw.project_id,
            private_key_id: raw.private_key_id.filter(|id| !id.is_empty()),
            private_key: SecretString::from(raw.private_key),
            client_email: raw.client_email.trim().to_string(),
            client_id: raw.client_id,
            token_uri: raw
                .token_uri
                .filter(|uri| !uri.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }

    /// Read and parse a key file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> GoogleResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading service account key file");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load from a key file path if given, otherwise from inline JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleError::Config`] when neither source is provided.
    pub fn load(path: Option<&str>, inline_json: Option<&str>) -> GoogleResult<Self> {
        let path = path.map(str::trim).filter(|p| !p.is_empty());
        let inline_json = inline_json.map(str::trim).filter(|j| !j.is_empty());

        match (path, inline_json) {
            (Some(path), _) => Self::from_file(path),
            (None, Some(json)) => Self::from_json(json),
            (None, None) => Err(GoogleError::Config(
                "Service account credentials not found. Provide GOOGLE_APPLICATION_CREDENTIALS \
                 (path) or SERVICE_ACCOUNT_JSON (inline JSON)."
                    .into(),
            )),
        }
    }

    pub(crate) fn private_key_pem(&self) -> &[u8] {
        self.private_key.expose_secret().as_bytes()
    }
}
