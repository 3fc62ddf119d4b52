//! SendPulse adapter tests.
//!
//! Covers the OAuth token cache as well as the send path: one token fetch
//! per validity window, mutual exclusion under concurrent deliveries, and
//! uniform delivery errors for both phases.

use std::sync::Arc;
use std::time::Duration;

use qrpost::providers::SendPulseMailer;
use qrpost::{Attachment, Email, MailError, Mailer};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn mailer(server: &MockServer) -> SendPulseMailer {
    SendPulseMailer::new("client-id", "client-secret").base_url(server.uri())
}

fn valid_email() -> Email {
    Email::new()
        .from(("Attendance System", "noreply@example.com"))
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .html_body("<p>Hello</p>")
}

fn token_response(expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": "sp-token-abc",
        "token_type": "Bearer",
        "expires_in": expires_in
    }))
}

fn send_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "result": true,
        "id": "sp-message-1"
    }))
}

async fn mount_token(server: &MockServer, expect: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=client-secret"))
        .respond_with(token_response(3600))
        .expect(expect)
        .mount(server)
        .await;
}

// ============================================================================
// Basic Delivery Tests
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_ok() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .and(header("Authorization", "Bearer sp-token-abc"))
        .and(header("Content-Type", "application/json"))
        .respond_with(send_response())
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn request_body_matches_sendpulse_shape() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .respond_with(send_response())
        .expect(1)
        .mount(&server)
        .await;

    let email = valid_email().attachment(Attachment::from_bytes("qr-code.png", vec![1, 2, 3]));
    mailer.deliver(&email).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let send = requests
        .iter()
        .find(|r| r.url.path() == "/smtp/emails")
        .unwrap();
    let body: Value = serde_json::from_slice(&send.body).unwrap();

    assert_eq!(body["email"]["subject"], "Hello, Avengers!");
    assert_eq!(body["email"]["from"]["name"], "Attendance System");
    assert_eq!(body["email"]["from"]["email"], "noreply@example.com");
    assert_eq!(body["email"]["to"][0]["email"], "steve.rogers@example.com");
    assert_eq!(body["email"]["html"], "<p>Hello</p>");
    assert_eq!(body["email"]["attachments_binary"]["qr-code.png"], "AQID");
}

// ============================================================================
// Token Cache Tests
// ============================================================================

#[tokio::test]
async fn token_is_cached_across_deliveries() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    // Two sends inside the validity window: exactly one token fetch.
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .respond_with(send_response())
        .expect(2)
        .mount(&server)
        .await;

    mailer.deliver(&valid_email()).await.unwrap();
    mailer.deliver(&valid_email()).await.unwrap();
}

#[tokio::test]
async fn expired_token_is_refetched() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    // expires_in of 60s leaves no lifetime after the 60s safety margin,
    // so the second delivery must fetch a fresh token.
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(token_response(60))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .respond_with(send_response())
        .expect(2)
        .mount(&server)
        .await;

    mailer.deliver(&valid_email()).await.unwrap();
    mailer.deliver(&valid_email()).await.unwrap();
}

#[tokio::test]
async fn concurrent_deliveries_share_one_token_fetch() {
    let server = MockServer::start().await;
    let mailer = Arc::new(mailer(&server));

    // Delay the token response so the deliveries genuinely overlap on the
    // empty cache.
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(token_response(3600).set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .respond_with(send_response())
        .expect(8)
        .mount(&server)
        .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let mailer = Arc::clone(&mailer);
        handles.push(tokio::spawn(async move {
            mailer.deliver(&valid_email()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

// ============================================================================
// Error Response Tests
// ============================================================================

#[tokio::test]
async fn token_endpoint_401_fails_before_send() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed"
        })))
        .expect(1)
        .mount(&server)
        .await;
    // The send endpoint must never be reached.
    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .respond_with(send_response())
        .expect(0)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("token phase"));
    assert!(err.to_string().contains("invalid_client"));
    match err {
        MailError::Delivery { status, .. } => assert_eq!(status, Some(401)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn send_endpoint_500_is_not_retried() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("response phase"));
    assert!(err.to_string().contains("internal error"));
}

#[tokio::test]
async fn send_endpoint_429_surfaces_status() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/smtp/emails"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limit exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    match result.unwrap_err() {
        MailError::Delivery { status, .. } => assert_eq!(status, Some(429)),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Validation Tests
// ============================================================================

#[tokio::test]
async fn deliver_without_from_returns_error() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    let email = Email::new()
        .to("steve.rogers@example.com")
        .subject("Hello!")
        .html_body("<p>Hi</p>");

    let result = mailer.deliver(&email).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("from"));
    // Nothing was sent, not even a token request.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn deliver_without_to_returns_error() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    let email = Email::new()
        .from("noreply@example.com")
        .subject("Hello!")
        .html_body("<p>Hi</p>");

    let result = mailer.deliver(&email).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("to"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn provider_name_returns_sendpulse() {
    let mailer = SendPulseMailer::new("client-id", "client-secret");
    assert_eq!(mailer.provider_name(), "sendpulse");
}

#[test]
fn validate_config_rejects_empty_credentials() {
    let mailer = SendPulseMailer::new("", "client-secret");
    assert!(matches!(
        mailer.validate_config(),
        Err(MailError::Configuration(_))
    ));

    let mailer = SendPulseMailer::new("client-id", "");
    assert!(matches!(
        mailer.validate_config(),
        Err(MailError::Configuration(_))
    ));

    let mailer = SendPulseMailer::new("client-id", "client-secret");
    assert!(mailer.validate_config().is_ok());
}
