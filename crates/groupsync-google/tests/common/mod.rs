//! Common test utilities for groupsync-google integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use groupsync_google::{GoogleDirectoryClient, StaticTokenSource};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// RSA key used to sign test assertions.
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_key.pem");
/// Public half of [`TEST_PRIVATE_KEY`].
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test_key.pub.pem");

pub const TEST_TOKEN: &str = "ya29.test-token";

/// Test data factory for Directory API groups.
pub fn create_test_group(email: &str, name: &str) -> Value {
    json!({
        "kind": "admin#directory#group",
        "id": format!("id-{email}"),
        "email": email,
        "name": name,
        "directMembersCount": "0",
        "description": ""
    })
}

/// Test data factory for Directory API members.
pub fn create_test_member(email: &str) -> Value {
    json!({
        "kind": "admin#directory#member",
        "id": format!("id-{email}"),
        "email": email,
        "role": "MEMBER",
        "type": "USER",
        "status": "ACTIVE"
    })
}

/// A groups.list page.
pub fn create_groups_page(groups: Vec<Value>, next_page_token: Option<&str>) -> Value {
    let mut page = json!({ "kind": "admin#directory#groups", "groups": groups });
    if let Some(token) = next_page_token {
        page["nextPageToken"] = json!(token);
    }
    page
}

/// A members.list page.
pub fn create_members_page(members: Vec<Value>, next_page_token: Option<&str>) -> Value {
    let mut page = json!({ "kind": "admin#directory#members", "members": members });
    if let Some(token) = next_page_token {
        page["nextPageToken"] = json!(token);
    }
    page
}

/// A Google API error envelope.
pub fn create_google_error(code: u16, reason: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{ "domain": "global", "reason": reason, "message": message }]
        }
    })
}

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// A service account key file pointing its token endpoint at `token_uri`.
pub fn create_service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "groupsync-test",
        "private_key_id": "test-key-id",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "sync@groupsync-test.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri
    })
    .to_string()
}

/// Mock server wrapper with common setup helpers.
pub struct MockDirectoryServer {
    pub server: MockServer,
}

impl MockDirectoryServer {
    /// Creates a new mock Directory API server.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Returns the mock server's base URL.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Client authorized with [`TEST_TOKEN`].
    pub fn client(&self) -> GoogleDirectoryClient {
        GoogleDirectoryClient::with_http_client(
            reqwest::Client::new(),
            self.url(),
            Arc::new(StaticTokenSource::new(TEST_TOKEN)),
        )
    }

    /// Sets up the OAuth token endpoint.
    pub async fn mock_token_endpoint(&self, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_token_response(access_token, 3600)),
            )
            .mount(&self.server)
            .await;
    }

    /// Serves `members` for `GET /groups/{group}/members`.
    pub async fn mock_members(&self, encoded_group: &str, members: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/groups/{encoded_group}/members")))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_members_page(members, None)),
            )
            .mount(&self.server)
            .await;
    }

    /// Responds with a Google error envelope for `method path`.
    pub async fn mock_error(&self, http_method: &str, request_path: &str, code: u16, reason: &str) {
        let body = create_google_error(code, reason, reason);
        Mock::given(method(http_method))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(code).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}
