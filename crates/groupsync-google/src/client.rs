//! Google Admin SDK Directory API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use groupsync_core::{
    DirectoryApi, GroupEmail, GroupPage, GroupQuery, GroupRecord, MemberPage, MemberRecord,
    NewGroup, NewMember, SyncError, SyncResult,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::auth::TokenSource;
use crate::error::{GoogleError, GoogleResult};

/// Directory API root.
pub const DEFAULT_BASE_URL: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Page size requested for list calls (the API maximum for groups).
pub const MAX_RESULTS: u32 = 200;

/// Customer alias for the account the credentials belong to.
pub const MY_CUSTOMER: &str = "my_customer";

const RATE_LIMIT_REASONS: [&str; 3] =
    ["rateLimitExceeded", "userRateLimitExceeded", "quotaExceeded"];

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
pub struct GoogleApiError {
    pub error: GoogleApiErrorBody,
}

/// Error body.
#[derive(Debug, Deserialize)]
pub struct GoogleApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<GoogleApiErrorDetail>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One entry of `error.errors`.
#[derive(Debug, Deserialize)]
pub struct GoogleApiErrorDetail {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Member insertion body on the wire.
#[derive(Debug, Serialize)]
struct MemberBody<'a> {
    email: &'a str,
    role: &'a str,
}

/// Map a non-success response onto the sync error taxonomy.
#[must_use]
pub fn map_error_response(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> SyncError {
    let parsed = serde_json::from_str::<GoogleApiError>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });
    let rate_limit_reason = parsed.as_ref().is_some_and(|e| {
        e.error
            .errors
            .iter()
            .any(|d| RATE_LIMIT_REASONS.contains(&d.reason.as_str()))
    });

    match status {
        StatusCode::NOT_FOUND => SyncError::NotFound(message),
        StatusCode::CONFLICT => SyncError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => SyncError::RateLimited {
            retry_after_secs,
            message,
        },
        StatusCode::FORBIDDEN if rate_limit_reason => SyncError::RateLimited {
            retry_after_secs,
            message,
        },
        StatusCode::UNAUTHORIZED => SyncError::Auth(message),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => SyncError::Transient {
            status: status.as_u16(),
            message,
        },
        _ => SyncError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Directory API client implementing the core's remote-directory port.
///
/// Each method is a single HTTP call; retries and pagination are driven by
/// [`groupsync_core::Directory`].
pub struct GoogleDirectoryClient {
    http_client: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for GoogleDirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDirectoryClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GoogleDirectoryClient {
    /// Creates a client against the public Directory API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token_source: Arc<dyn TokenSource>, timeout: Duration) -> GoogleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GoogleError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_http_client(
            http_client,
            DEFAULT_BASE_URL,
            token_source,
        ))
    }

    /// Creates a client with a caller-provided HTTP client and base URL.
    #[must_use]
    pub fn with_http_client(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    /// Returns the API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn group_url(&self, group: &GroupEmail) -> String {
        format!("{}/groups/{}", self.base_url, urlencoding::encode(group.as_str()))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client.request(method, url)
    }

    /// Authorize and send one request, decoding a JSON success body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let token = self.token_source.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| SyncError::InvalidData(format!("Failed to parse response: {e}")));
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let error = map_error_response(status, retry_after, &body);

        if status == StatusCode::UNAUTHORIZED {
            warn!("Access token rejected, invalidating cached token");
            self.token_source.invalidate().await;
        } else {
            debug!(status = status.as_u16(), error = %error, "Directory API request failed");
        }

        Err(error)
    }
}

#[async_trait]
impl DirectoryApi for GoogleDirectoryClient {
    #[instrument(skip(self))]
    async fn list_groups(
        &self,
        query: &GroupQuery,
        page_token: Option<&str>,
    ) -> SyncResult<GroupPage> {
        let url = format!("{}/groups", self.base_url);
        let mut params: Vec<(&str, String)> = vec![("maxResults", MAX_RESULTS.to_string())];

        if let Some(domain) = query.domain.as_deref() {
            params.push(("domain", domain.to_string()));
        }
        if let Some(customer) = query.customer.as_deref() {
            params.push(("customer", customer.to_string()));
        }
        if query.domain.is_none() && query.customer.is_none() {
            params.push(("customer", MY_CUSTOMER.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        self.send(self.request(Method::GET, &url).query(&params)).await
    }

    #[instrument(skip(self), fields(group = %group))]
    async fn list_members(
        &self,
        group: &GroupEmail,
        page_token: Option<&str>,
    ) -> SyncResult<MemberPage> {
        let url = format!("{}/members", self.group_url(group));
        let mut params: Vec<(&str, String)> = vec![("maxResults", MAX_RESULTS.to_string())];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        self.send(self.request(Method::GET, &url).query(&params)).await
    }

    #[instrument(skip(self, group), fields(group = %group.email))]
    async fn insert_group(&self, group: &NewGroup) -> SyncResult<GroupRecord> {
        let url = format!("{}/groups", self.base_url);
        self.send(self.request(Method::POST, &url).json(group)).await
    }

    #[instrument(skip(self, member), fields(group = %group, member = %member.email))]
    async fn insert_member(
        &self,
        group: &GroupEmail,
        member: &NewMember,
    ) -> SyncResult<MemberRecord> {
        let url = format!("{}/members", self.group_url(group));
        let body = MemberBody {
            email: member.email.as_str(),
            role: member.role.as_str(),
        };
        self.send(self.request(Method::POST, &url).json(&body)).await
    }

    #[instrument(skip(self), fields(group = %group))]
    async fn get_group(&self, group: &GroupEmail) -> SyncResult<GroupRecord> {
        self.send(self.request(Method::GET, &self.group_url(group))).await
    }
}
