//! GitHub client tests against a local mock server.

use mockito::Matcher;
use serde_json::json;
use triagebot_common::{Issue, TriageError};
use triagebot_github::{Delivery, GithubClient, GithubConfig, IssueTracker};

const ISSUE_PATH: &str = "/repos/acme/widgets/issues/42";

fn issue_at(server: &mockito::Server) -> Issue {
    Issue::new(1001, 42, "Login page is broken")
        .with_body("I cannot login when I click the button")
        .with_url(format!("{}{}", server.url(), ISSUE_PATH))
}

fn client(token: Option<&str>) -> GithubClient {
    GithubClient::with_token(&GithubConfig::default(), token.map(String::from)).unwrap()
}

#[tokio::test]
async fn test_add_labels_posts_label_list() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/acme/widgets/issues/42/labels")
        .match_header("authorization", "Bearer ghp_test")
        .match_header("accept", "application/vnd.github+json")
        .match_header("x-github-api-version", "2022-11-28")
        .match_body(Matcher::Json(json!({ "labels": ["triage/bug"] })))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let delivery = client(Some("ghp_test"))
        .add_labels(&issue_at(&server), &["triage/bug".to_string()])
        .await
        .unwrap();

    assert_eq!(delivery, Delivery::Sent);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_comment_sends_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/acme/widgets/issues/42/comments")
        .match_body(Matcher::Json(json!({ "body": "Thanks for the report!" })))
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let delivery = client(Some("ghp_test"))
        .post_comment(&issue_at(&server), "Thanks for the report!")
        .await
        .unwrap();

    assert_eq!(delivery, Delivery::Sent);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_external_service_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/repos/acme/widgets/issues/42/labels")
        .with_status(403)
        .with_body(r#"{"message": "Resource not accessible by integration"}"#)
        .create_async()
        .await;

    let err = client(Some("ghp_test"))
        .add_labels(&issue_at(&server), &["triage/bug".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, TriageError::ExternalService(_)));
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn test_missing_token_skips_api_calls() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let tracker = client(None);
    assert!(!tracker.has_token());
    let issue = issue_at(&server);
    let labels = tracker
        .add_labels(&issue, &["triage/bug".to_string()])
        .await
        .unwrap();
    let comment = tracker.post_comment(&issue, "hello").await.unwrap();

    assert_eq!(labels, Delivery::Skipped);
    assert_eq!(comment, Delivery::Skipped);
    mock.assert_async().await;
}
