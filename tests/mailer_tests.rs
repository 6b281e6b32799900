//! Webhook mailer tests against a mocked relay.

use cvault::mail::{CodeMailer, CodePurpose, MailError, WebhookMailer};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mailer_for(server: &MockServer) -> WebhookMailer {
    let url = reqwest::Url::parse(&format!("{}/send", server.uri())).expect("valid url");
    WebhookMailer::new(url, Duration::from_secs(5)).expect("client should build")
}

#[tokio::test]
async fn test_webhook_posts_code_as_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "to": "ana@example.com",
            "subject": "Confirm your email address",
            "purpose": "verification",
            "code": "042137"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    mailer_for(&mock_server)
        .send_code("ana@example.com", "042137", CodePurpose::Verification)
        .await
        .expect("relay accepted the message");
}

#[tokio::test]
async fn test_webhook_login_purpose() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(json!({
            "to": "ana@example.com",
            "subject": "Your sign-in code",
            "purpose": "login",
            "code": "999999"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    mailer_for(&mock_server)
        .send_code("ana@example.com", "999999", CodePurpose::Login)
        .await
        .expect("relay accepted the message");
}

#[tokio::test]
async fn test_webhook_rejection_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let result = mailer_for(&mock_server)
        .send_code("ana@example.com", "123456", CodePurpose::Verification)
        .await;

    assert!(matches!(result, Err(MailError::Rejected(500))));
}

#[tokio::test]
async fn test_webhook_unreachable_relay() {
    // Nothing listens on the discard port
    let url = reqwest::Url::parse("http://127.0.0.1:9/send").expect("valid url");
    let mailer = WebhookMailer::new(url, Duration::from_secs(2)).expect("client should build");

    let result = mailer
        .send_code("ana@example.com", "123456", CodePurpose::Login)
        .await;

    assert!(matches!(result, Err(MailError::Transport(_))));
}
