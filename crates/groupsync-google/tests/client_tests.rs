//! Directory API client tests against a mock server.

mod common;

use common::*;
use groupsync_core::{
    DirectoryApi, GroupEmail, GroupQuery, MemberEmail, MemberRole, NewGroup, NewMember, SyncError,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

fn group(address: &str) -> GroupEmail {
    GroupEmail::from_address(address).unwrap()
}

#[tokio::test]
async fn test_list_groups_sends_domain_page_size_and_token() {
    let mock = MockDirectoryServer::new().await;

    Mock::given(method("GET"))
        .and(path("/groups"))
        .and(query_param("domain", "x.com"))
        .and(query_param("maxResults", "200"))
        .and(query_param("pageToken", "next-1"))
        .and(query_param_is_missing("customer"))
        .and(header("authorization", "Bearer ya29.test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_groups_page(
            vec![create_test_group("eng@x.com", "Eng")],
            Some("next-2"),
        )))
        .expect(1)
        .mount(&mock.server)
        .await;

    let query = GroupQuery {
        domain: Some("x.com".into()),
        customer: None,
    };
    let page = mock.client().list_groups(&query, Some("next-1")).await.unwrap();

    assert_eq!(page.groups.len(), 1);
    assert_eq!(page.groups[0].email.as_deref(), Some("eng@x.com"));
    assert_eq!(page.groups[0].name.as_deref(), Some("Eng"));
    assert_eq!(page.next_page_token.as_deref(), Some("next-2"));
}

#[tokio::test]
async fn test_list_groups_defaults_to_my_customer() {
    let mock = MockDirectoryServer::new().await;

    Mock::given(method("GET"))
        .and(path("/groups"))
        .and(query_param("customer", "my_customer"))
        .and(query_param_is_missing("domain"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "admin#directory#groups"
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let page = mock
        .client()
        .list_groups(&GroupQuery::default(), None)
        .await
        .unwrap();

    // No "groups" key at all on an empty directory.
    assert!(page.groups.is_empty());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_list_members_parses_records() {
    let mock = MockDirectoryServer::new().await;
    mock.mock_members(
        "eng%40x.com",
        vec![
            create_test_member("a@x.com"),
            json!({
                "kind": "admin#directory#member",
                "id": "C01",
                "role": "MEMBER",
                "type": "CUSTOMER"
            }),
        ],
    )
    .await;

    let page = mock.client().list_members(&group("eng@x.com"), None).await.unwrap();

    assert_eq!(page.members.len(), 2);
    assert_eq!(page.members[0].email.as_deref(), Some("a@x.com"));
    assert_eq!(page.members[0].member_type.as_deref(), Some("USER"));
    assert_eq!(page.members[0].status.as_deref(), Some("ACTIVE"));
    assert!(page.members[1].email.is_none());
}

#[tokio::test]
async fn test_list_members_not_found() {
    let mock = MockDirectoryServer::new().await;
    mock.mock_error("GET", "/groups/ghost%40x.com/members", 404, "notFound")
        .await;

    let err = mock
        .client()
        .list_members(&group("ghost@x.com"), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_insert_group_posts_body() {
    let mock = MockDirectoryServer::new().await;

    Mock::given(method("POST"))
        .and(path("/groups"))
        .and(body_json(json!({
            "email": "aws_admins@x.com",
            "name": "AWS_Admins",
            "description": "Provisioned by AD - Google sync"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_test_group("aws_admins@x.com", "AWS_Admins")),
        )
        .expect(1)
        .mount(&mock.server)
        .await;

    let record = mock
        .client()
        .insert_group(&NewGroup {
            email: group("aws_admins@x.com"),
            name: "AWS_Admins".into(),
            description: groupsync_core::DEFAULT_GROUP_DESCRIPTION.into(),
        })
        .await
        .unwrap();
    assert_eq!(record.id.as_deref(), Some("id-aws_admins@x.com"));
}

#[tokio::test]
async fn test_insert_group_conflict() {
    let mock = MockDirectoryServer::new().await;
    mock.mock_error("POST", "/groups", 409, "duplicate").await;

    let err = mock
        .client()
        .insert_group(&NewGroup {
            email: group("eng@x.com"),
            name: "eng".into(),
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_insert_member_posts_email_and_role() {
    let mock = MockDirectoryServer::new().await;

    Mock::given(method("POST"))
        .and(path("/groups/eng%40x.com/members"))
        .and(body_json(json!({ "email": "a@x.com", "role": "MEMBER" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_test_member("a@x.com")))
        .expect(1)
        .mount(&mock.server)
        .await;

    let record = mock
        .client()
        .insert_member(
            &group("eng@x.com"),
            &NewMember {
                email: MemberEmail::parse("a@x.com").unwrap(),
                role: MemberRole::Member,
            },
        )
        .await
        .unwrap();
    assert_eq!(record.role.as_deref(), Some("MEMBER"));
}

#[tokio::test]
async fn test_get_group() {
    let mock = MockDirectoryServer::new().await;

    Mock::given(method("GET"))
        .and(path("/groups/eng%40x.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_test_group("eng@x.com", "Eng")),
        )
        .mount(&mock.server)
        .await;

    let record = mock.client().get_group(&group("eng@x.com")).await.unwrap();
    assert_eq!(record.name.as_deref(), Some("Eng"));
}

#[tokio::test]
async fn test_rate_limit_with_retry_after() {
    let mock = MockDirectoryServer::new().await;

    Mock::given(method("GET"))
        .and(path("/groups"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "12")
                .set_body_json(create_google_error(
                    429,
                    "rateLimitExceeded",
                    "Rate Limit Exceeded",
                )),
        )
        .mount(&mock.server)
        .await;

    let err = mock
        .client()
        .list_groups(&GroupQuery::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::RateLimited {
            retry_after_secs: Some(12),
            ..
        }
    ));
}

#[tokio::test]
async fn test_forbidden_quota_is_retryable() {
    let mock = MockDirectoryServer::new().await;
    mock.mock_error("GET", "/groups/eng%40x.com/members", 403, "userRateLimitExceeded")
        .await;

    let err = mock
        .client()
        .list_members(&group("eng@x.com"), None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_success_body_is_invalid_data() {
    let mock = MockDirectoryServer::new().await;

    Mock::given(method("GET"))
        .and(path("/groups/eng%40x.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock.server)
        .await;

    let err = mock.client().get_group(&group("eng@x.com")).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidData(_)));
}
