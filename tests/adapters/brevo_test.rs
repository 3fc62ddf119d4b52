//! Brevo adapter tests.

use qrpost::providers::BrevoMailer;
use qrpost::{Attachment, Email, MailError, Mailer};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn valid_email() -> Email {
    Email::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .html_body("<h1>Hello</h1>")
        .text_body("Hello")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "messageId": "<42.11@relay.example.com>"
    }))
}

// ============================================================================
// Basic Delivery Tests
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_ok() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("test-api-key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(header("api-key", "test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "sender": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "subject": "Hello, Avengers!",
            "htmlContent": "<h1>Hello</h1>",
            "textContent": "Hello"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn delivery_with_sender_name_returns_ok() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("test-api-key").base_url(server.uri());

    let email = Email::new()
        .from(("T Stark", "tony.stark@example.com"))
        .to(("Steve Rogers", "steve.rogers@example.com"))
        .subject("Hello, Avengers!")
        .html_body("<h1>Hello</h1>");

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(body_json(json!({
            "sender": {"name": "T Stark", "email": "tony.stark@example.com"},
            "to": [{"name": "Steve Rogers", "email": "steve.rogers@example.com"}],
            "subject": "Hello, Avengers!",
            "htmlContent": "<h1>Hello</h1>"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&email).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn delivery_with_attachment_returns_ok() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("test-api-key").base_url(server.uri());

    let email = valid_email().attachment(Attachment::from_bytes("qr-code.png", vec![1, 2, 3]));

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(body_json(json!({
            "sender": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "subject": "Hello, Avengers!",
            "htmlContent": "<h1>Hello</h1>",
            "textContent": "Hello",
            "attachment": [{"name": "qr-code.png", "content": "AQID"}]
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&email).await;
    assert!(result.is_ok());
}

// ============================================================================
// Error Response Tests
// ============================================================================

#[tokio::test]
async fn deliver_with_429_response() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("test-api-key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "code": "too_many_requests",
            "message": "The expected rate limit is exceeded."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("too_many_requests"));
    assert!(err.to_string().contains("response phase"));
}

#[tokio::test]
async fn deliver_with_401_response() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("bad-key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "unauthorized",
            "message": "Key not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    match result.unwrap_err() {
        MailError::Delivery { status, .. } => assert_eq!(status, Some(401)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn deliver_with_500_response_is_not_retried() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("test-api-key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .respond_with(ResponseTemplate::new(500).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.deliver(&valid_email()).await;
    assert!(result.is_err());
}

// ============================================================================
// Validation Tests
// ============================================================================

#[tokio::test]
async fn deliver_without_from_returns_error() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("test-api-key").base_url(server.uri());

    let email = Email::new()
        .to("steve.rogers@example.com")
        .subject("Hello!")
        .text_body("Hi");

    let result = mailer.deliver(&email).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("from"));
}

#[tokio::test]
async fn deliver_without_to_returns_error() {
    let server = MockServer::start().await;
    let mailer = BrevoMailer::new("test-api-key").base_url(server.uri());

    let email = Email::new()
        .from("tony.stark@example.com")
        .subject("Hello!")
        .text_body("Hi");

    let result = mailer.deliver(&email).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("to"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn provider_name_returns_brevo() {
    let mailer = BrevoMailer::new("test-api-key");
    assert_eq!(mailer.provider_name(), "brevo");
}

#[test]
fn validate_config_rejects_empty_key() {
    let mailer = BrevoMailer::new("");
    assert!(matches!(
        mailer.validate_config(),
        Err(MailError::Configuration(_))
    ));
}
