//! OAuth2 access tokens for the Directory API.
//!
//! Service accounts authenticate with the JWT bearer grant: a self-signed
//! RS256 assertion naming the delegated admin (`sub`) is exchanged at the
//! key's token endpoint for a short-lived access token.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::credentials::ServiceAccountKey;
use crate::error::{GoogleError, GoogleResult};

/// Scope for reading and managing groups.
pub const SCOPE_GROUP: &str = "https://www.googleapis.com/auth/admin.directory.group";
/// Scope for reading and managing group memberships.
pub const SCOPE_GROUP_MEMBER: &str =
    "https://www.googleapis.com/auth/admin.directory.group.member";

/// Scopes requested when none are configured.
#[must_use]
pub fn default_scopes() -> Vec<String> {
    vec![SCOPE_GROUP.to_string(), SCOPE_GROUP_MEMBER.to_string()]
}

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Supplies bearer tokens to the Directory client.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A valid access token.
    async fn access_token(&self) -> GoogleResult<String>;

    /// Drop any cached token so the next call fetches a fresh one.
    async fn invalidate(&self) {}
}

/// Serves a pre-issued token.
pub struct StaticTokenSource {
    token: SecretString,
}

impl StaticTokenSource {
    /// Wrap an already minted access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> GoogleResult<String> {
        Ok(self.token.expose_secret().to_string())
    }
}

/// Claims of the signed assertion.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
}

/// Cached access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Domain-wide delegated service account tokens, cached until shortly
/// before expiry.
#[derive(Debug)]
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    subject: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
    /// Grace period before expiry to trigger refresh (default: 5 minutes).
    grace_period: Duration,
}

impl ServiceAccountTokenSource {
    /// Creates a token source acting on behalf of `subject`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject is empty or the HTTP client cannot be built.
    pub fn new(
        key: ServiceAccountKey,
        subject: impl Into<String>,
        scopes: Vec<String>,
    ) -> GoogleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| GoogleError::Config(format!("Failed to create HTTP client: {e}")))?;
        Self::with_http_client(key, subject, scopes, http_client)
    }

    /// Creates a token source with a caller-provided HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject is empty.
    pub fn with_http_client(
        key: ServiceAccountKey,
        subject: impl Into<String>,
        scopes: Vec<String>,
        http_client: reqwest::Client,
    ) -> GoogleResult<Self> {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(GoogleError::Config("delegated subject is required".into()));
        }
        let scopes: Vec<String> = scopes
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let scopes = if scopes.is_empty() {
            default_scopes()
        } else {
            scopes
        };

        Ok(Self {
            key,
            subject,
            scopes,
            http_client,
            cached_token: RwLock::new(None),
            grace_period: Duration::minutes(5),
        })
    }

    /// Scopes requested for each token.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Build and sign the JWT bearer assertion.
    pub(crate) fn sign_assertion(&self, now: DateTime<Utc>) -> GoogleResult<String> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            sub: self.subject.clone(),
            scope: self.scopes.join(" "),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.key.private_key_id);

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key_pem())?;
        Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
    }

    /// Exchanges a fresh assertion for an access token.
    #[instrument(skip(self), fields(subject = %self.subject))]
    async fn acquire_token(&self) -> GoogleResult<CachedToken> {
        let assertion = self.sign_assertion(Utc::now())?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)];

        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleError::TokenRequest {
                status,
                message: body,
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Auth(format!("Failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in.unwrap_or(3600));

        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> GoogleResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Refreshing access token");
        let token = self.acquire_token().await?;
        let access_token = token.access_token.clone();
        *self.cached_token.write().await = Some(token);
        Ok(access_token)
    }

    async fn invalidate(&self) {
        *self.cached_token.write().await = None;
    }
}
